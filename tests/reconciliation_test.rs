mod common;

use std::sync::Arc;

use common::{sign, test_config, InMemoryStore, TEST_CUSTOMER_ID, TEST_KEY_SECRET};
use mongodb::bson::DateTime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_service::error::BookingError;
use booking_service::models::booking::{Actor, BookingStatus, PickupMode};
use booking_service::models::payment::{
    LedgerEntryStatus, PaymentLedgerEntry, PaymentOrder, PaymentOrderStatus,
};
use booking_service::pricing::{DurationTier, PricingEngine, RentalOffer};
use booking_service::services::bookings::{BookingService, CreateBooking};
use booking_service::services::razorpay::{CheckoutCallback, RazorpayClient};
use booking_service::services::reconciler::{PaymentReconciler, ReconcileOutcome};
use booking_service::services::BookingStore;

struct Harness {
    store: Arc<InMemoryStore>,
    bookings: BookingService,
    reconciler: PaymentReconciler,
}

fn harness(gateway_base_url: &str) -> Harness {
    let config = test_config(gateway_base_url);
    let store = Arc::new(InMemoryStore::default());
    let razorpay = RazorpayClient::new(config.razorpay.clone());
    let bookings = BookingService::new(
        store.clone(),
        PricingEngine::new(&config.pricing),
        config.pricing.currency.clone(),
    );
    let reconciler = PaymentReconciler::new(store.clone(), razorpay);
    Harness {
        store,
        bookings,
        reconciler,
    }
}

fn seven_day_booking() -> CreateBooking {
    CreateBooking {
        customer_id: TEST_CUSTOMER_ID.to_string(),
        offer: RentalOffer {
            bike_id: "bike-1".to_string(),
            daily_rate: 50_000,
            weekly_rate: None,
        },
        tier: DurationTier::SevenDay,
        pickup_at: DateTime::now(),
        pickup_mode: PickupMode::Station {
            location_id: "stn-1".to_string(),
        },
    }
}

/// Insert an already-open payment order, as if checkout had been
/// initiated, without calling the gateway.
async fn open_order_directly(h: &Harness, booking: &booking_service::models::booking::BookingRecord) -> PaymentOrder {
    let order = PaymentOrder::open(
        booking.id,
        booking.total_amount,
        booking.currency.clone(),
        format!("order_{}", booking.id.simple()),
    );
    h.store.insert_order(order.clone()).await.unwrap();
    order
}

fn success_callback(order: &PaymentOrder, payment_id: &str) -> CheckoutCallback {
    let signature = sign(
        &format!("{}|{}", order.provider_order_id, payment_id),
        TEST_KEY_SECRET,
    );
    CheckoutCallback {
        razorpay_order_id: order.provider_order_id.clone(),
        razorpay_payment_id: payment_id.to_string(),
        razorpay_signature: signature,
    }
}

#[tokio::test]
async fn verified_success_confirms_booking() {
    let h = harness("http://unused");
    let booking = h.bookings.create_booking(seven_day_booking()).await.unwrap();
    let order = open_order_directly(&h, &booking).await;

    let result = h
        .reconciler
        .reconcile(success_callback(&order, "pay_1"))
        .await
        .unwrap();

    assert_eq!(result.outcome, ReconcileOutcome::Confirmed);
    assert_eq!(result.booking_status, BookingStatus::Confirmed);
    assert_eq!(result.entry.status, LedgerEntryStatus::Success);
    assert_eq!(result.entry.amount, 331_700);

    let stored = h.bookings.get_booking(booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Confirmed);

    let consumed = h
        .store
        .find_order_by_provider_ref(&order.provider_order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(consumed.status, PaymentOrderStatus::Consumed);
}

#[tokio::test]
async fn duplicate_callback_is_absorbed() {
    let h = harness("http://unused");
    let booking = h.bookings.create_booking(seven_day_booking()).await.unwrap();
    let order = open_order_directly(&h, &booking).await;
    let callback = success_callback(&order, "pay_1");

    let first = h.reconciler.reconcile(callback.clone()).await.unwrap();
    let second = h.reconciler.reconcile(callback).await.unwrap();

    assert_eq!(first.outcome, ReconcileOutcome::Confirmed);
    assert_eq!(second.outcome, ReconcileOutcome::AlreadyReconciled);
    assert_eq!(second.entry.id, first.entry.id);

    // Exactly one SUCCESS entry and one confirmed booking.
    assert_eq!(
        h.store.ledger_statuses(booking.id),
        vec![LedgerEntryStatus::Success]
    );
    assert_eq!(
        h.bookings.get_booking(booking.id).await.unwrap().status,
        BookingStatus::Confirmed
    );
}

#[tokio::test]
async fn redelivery_confirms_booking_after_interrupted_settlement() {
    let h = harness("http://unused");
    let booking = h.bookings.create_booking(seven_day_booking()).await.unwrap();
    let order = open_order_directly(&h, &booking).await;

    // A settlement that died right after the ledger insert: SUCCESS is on
    // the books but the booking never left PENDING_PAYMENT.
    let entry = PaymentLedgerEntry::record(
        &order,
        LedgerEntryStatus::Success,
        Some("pay_1".to_string()),
        None,
    );
    h.store.insert_ledger_entry(entry).await.unwrap();
    assert_eq!(
        h.bookings.get_booking(booking.id).await.unwrap().status,
        BookingStatus::PendingPayment
    );

    // The gateway redelivers; the guard absorbs the duplicate but still
    // drives the booking to CONFIRMED.
    let result = h
        .reconciler
        .reconcile(success_callback(&order, "pay_1"))
        .await
        .unwrap();

    assert_eq!(result.outcome, ReconcileOutcome::AlreadyReconciled);
    assert_eq!(result.booking_status, BookingStatus::Confirmed);
    assert_eq!(
        h.store.ledger_statuses(booking.id),
        vec![LedgerEntryStatus::Success]
    );
    assert_eq!(
        h.bookings.get_booking(booking.id).await.unwrap().status,
        BookingStatus::Confirmed
    );
}

#[tokio::test]
async fn forged_signature_leaves_no_trace() {
    let h = harness("http://unused");
    let booking = h.bookings.create_booking(seven_day_booking()).await.unwrap();
    let order = open_order_directly(&h, &booking).await;

    let err = h
        .reconciler
        .reconcile(CheckoutCallback {
            razorpay_order_id: order.provider_order_id.clone(),
            razorpay_payment_id: "pay_evil".to_string(),
            razorpay_signature: "deadbeef".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::SignatureInvalid));
    assert!(h.store.ledger_statuses(booking.id).is_empty());
    assert_eq!(
        h.bookings.get_booking(booking.id).await.unwrap().status,
        BookingStatus::PendingPayment
    );
}

#[tokio::test]
async fn unknown_order_is_rejected_without_side_effects() {
    let h = harness("http://unused");

    let err = h
        .reconciler
        .reconcile(CheckoutCallback {
            razorpay_order_id: "order_unknown".to_string(),
            razorpay_payment_id: "pay_1".to_string(),
            razorpay_signature: sign("order_unknown|pay_1", TEST_KEY_SECRET),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::UnknownOrder));
    assert_eq!(h.store.order_count(), 0);
}

#[tokio::test]
async fn capture_after_cancellation_is_recorded_but_stale() {
    let h = harness("http://unused");
    let booking = h.bookings.create_booking(seven_day_booking()).await.unwrap();
    let order = open_order_directly(&h, &booking).await;

    // Customer cancels moments before the gateway confirms the capture.
    h.bookings
        .cancel(booking.id, Actor::Customer)
        .await
        .unwrap();

    let result = h
        .reconciler
        .reconcile(success_callback(&order, "pay_late"))
        .await
        .unwrap();

    assert_eq!(result.outcome, ReconcileOutcome::RecordedStale);
    assert_eq!(result.booking_status, BookingStatus::Cancelled);
    // The money is on the books for manual follow-up, the booking stays
    // cancelled.
    assert_eq!(
        h.store.ledger_statuses(booking.id),
        vec![LedgerEntryStatus::Success]
    );
    assert_eq!(
        h.bookings.get_booking(booking.id).await.unwrap().status,
        BookingStatus::Cancelled
    );
}

#[tokio::test]
async fn two_failures_then_success() {
    let h = harness("http://unused");
    let booking = h.bookings.create_booking(seven_day_booking()).await.unwrap();
    let order = open_order_directly(&h, &booking).await;

    for attempt in ["pay_f1", "pay_f2"] {
        h.reconciler
            .record_failure(
                &order.provider_order_id,
                Some(attempt.to_string()),
                Some("Card declined".to_string()),
            )
            .await
            .unwrap();

        // Still payable after each failure.
        assert_eq!(
            h.bookings.get_booking(booking.id).await.unwrap().status,
            BookingStatus::PendingPayment
        );
    }

    let result = h
        .reconciler
        .reconcile(success_callback(&order, "pay_ok"))
        .await
        .unwrap();

    assert_eq!(result.outcome, ReconcileOutcome::Confirmed);
    assert_eq!(
        h.store.ledger_statuses(booking.id),
        vec![
            LedgerEntryStatus::Failed,
            LedgerEntryStatus::Failed,
            LedgerEntryStatus::Success,
        ]
    );
}

#[tokio::test]
async fn open_order_rejects_amount_mismatch() {
    let h = harness("http://unused");
    let booking = h.bookings.create_booking(seven_day_booking()).await.unwrap();

    for wrong in [0, 1, booking.total_amount - 1, booking.total_amount + 1] {
        let err = h.reconciler.open_order(booking.id, wrong).await.unwrap_err();
        assert!(matches!(err, BookingError::AmountMismatch { .. }), "amount {wrong}");
    }

    // No order was created by any rejected attempt.
    assert_eq!(h.store.order_count(), 0);
}

#[tokio::test]
async fn open_order_rejects_non_payable_booking() {
    let h = harness("http://unused");
    let booking = h.bookings.create_booking(seven_day_booking()).await.unwrap();
    h.bookings.cancel(booking.id, Actor::Admin).await.unwrap();

    let err = h
        .reconciler
        .open_order(booking.id, booking.total_amount)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BookingError::BookingNotPayable {
            status: BookingStatus::Cancelled
        }
    ));
}

#[tokio::test]
async fn reopening_supersedes_abandoned_order() {
    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "order_wm_1",
            "amount": 331700,
            "currency": "INR",
            "status": "created",
            "receipt": null
        })))
        .expect(2)
        .mount(&gateway)
        .await;

    let h = harness(&gateway.uri());
    let booking = h.bookings.create_booking(seven_day_booking()).await.unwrap();

    h.reconciler
        .open_order(booking.id, booking.total_amount)
        .await
        .unwrap();
    h.reconciler
        .open_order(booking.id, booking.total_amount)
        .await
        .unwrap();

    // The abandoned first order is expired, exactly one stays open.
    assert_eq!(h.store.order_count(), 2);
    assert_eq!(h.store.open_order_count(booking.id), 1);
}

#[tokio::test]
async fn cancellation_expires_open_orders() {
    let h = harness("http://unused");
    let booking = h.bookings.create_booking(seven_day_booking()).await.unwrap();
    open_order_directly(&h, &booking).await;
    assert_eq!(h.store.open_order_count(booking.id), 1);

    h.bookings.cancel(booking.id, Actor::Customer).await.unwrap();

    assert_eq!(h.store.open_order_count(booking.id), 0);
}

#[tokio::test]
async fn webhook_style_capture_settles_once() {
    let h = harness("http://unused");
    let booking = h.bookings.create_booking(seven_day_booking()).await.unwrap();
    let order = open_order_directly(&h, &booking).await;

    // Checkout callback and webhook delivery race; whichever lands second
    // is absorbed.
    let first = h
        .reconciler
        .reconcile_captured(&order.provider_order_id, "pay_1".to_string())
        .await
        .unwrap();
    let second = h
        .reconciler
        .reconcile(success_callback(&order, "pay_1"))
        .await
        .unwrap();

    assert_eq!(first.outcome, ReconcileOutcome::Confirmed);
    assert_eq!(second.outcome, ReconcileOutcome::AlreadyReconciled);
    assert_eq!(
        h.store.ledger_statuses(booking.id),
        vec![LedgerEntryStatus::Success]
    );
}
