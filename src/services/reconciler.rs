//! Payment order lifecycle and exactly-once settlement.
//!
//! The reconciler is the only code allowed to confirm a booking. It
//! verifies gateway proofs, appends ledger entries and drives the booking
//! state machine, absorbing duplicate callbacks through the ledger
//! idempotency guard. Verification failures leave no ledger trace; genuine
//! payment failures are recorded so the audit history survives retries.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::BookingError;
use crate::models::booking::BookingStatus;
use crate::models::payment::{
    LedgerEntryStatus, PaymentLedgerEntry, PaymentOrder, PaymentOrderStatus,
};
use crate::services::metrics;
use crate::services::razorpay::{CheckoutCallback, RazorpayClient};
use crate::services::store::BookingStore;

/// What a verified success callback did to the booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Payment settled and the booking moved to CONFIRMED.
    Confirmed,
    /// A SUCCESS entry already existed; nothing was written.
    AlreadyReconciled,
    /// Payment settled but the booking had already left PENDING_PAYMENT
    /// (e.g. a concurrent cancellation). The money is recorded and the
    /// case is surfaced for manual follow-up.
    RecordedStale,
}

#[derive(Debug, Clone)]
pub struct ReconcileResult {
    pub outcome: ReconcileOutcome,
    pub entry: PaymentLedgerEntry,
    pub booking_status: BookingStatus,
}

#[derive(Clone)]
pub struct PaymentReconciler {
    store: Arc<dyn BookingStore>,
    razorpay: RazorpayClient,
}

impl PaymentReconciler {
    pub fn new(store: Arc<dyn BookingStore>, razorpay: RazorpayClient) -> Self {
        Self { store, razorpay }
    }

    /// Open a payment order against a booking's frozen total.
    ///
    /// The caller re-states the amount it showed the customer; any
    /// divergence from the persisted total is a hard failure. A previously
    /// open order for the same booking (an abandoned checkout) is expired
    /// and superseded rather than reused.
    pub async fn open_order(
        &self,
        booking_id: Uuid,
        requested_amount: i64,
    ) -> Result<PaymentOrder, BookingError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound)?;

        if booking.status != BookingStatus::PendingPayment {
            return Err(BookingError::BookingNotPayable {
                status: booking.status,
            });
        }
        if requested_amount != booking.total_amount {
            return Err(BookingError::AmountMismatch {
                expected: booking.total_amount,
                got: requested_amount,
            });
        }

        if let Some(prior) = self.store.find_open_order(booking_id).await? {
            let superseded = self.store.expire_open_orders(booking_id).await?;
            tracing::info!(
                booking_id = %booking_id,
                prior_order_id = %prior.id,
                superseded,
                "expired abandoned payment orders before reopening"
            );
        }

        let gateway_order = self
            .razorpay
            .create_order(
                booking.total_amount as u64,
                &booking.currency,
                Some(booking.id.to_string()),
            )
            .await
            .map_err(BookingError::Gateway)?;

        let order = PaymentOrder::open(
            booking.id,
            booking.total_amount,
            booking.currency.clone(),
            gateway_order.id,
        );
        self.store.insert_order(order.clone()).await?;

        tracing::info!(
            booking_id = %booking_id,
            order_id = %order.id,
            provider_order_id = %order.provider_order_id,
            amount = order.amount,
            "payment order opened"
        );

        Ok(order)
    }

    /// Reconcile a checkout success callback, exactly once.
    ///
    /// The order must be known and the signature must verify before any
    /// side effect happens. A duplicate receipt returns the prior result
    /// without writing a second SUCCESS entry or re-transitioning the
    /// booking.
    pub async fn reconcile(
        &self,
        callback: CheckoutCallback,
    ) -> Result<ReconcileResult, BookingError> {
        let order = self
            .store
            .find_order_by_provider_ref(&callback.razorpay_order_id)
            .await?
            .ok_or(BookingError::UnknownOrder)?;

        self.razorpay.verify_checkout_signature(&callback)?;

        self.settle(order, callback.razorpay_payment_id).await
    }

    /// Settle a capture reported by a webhook. The webhook body signature
    /// has already been verified at the transport boundary; that delivery
    /// is the gateway's proof for this path.
    pub async fn reconcile_captured(
        &self,
        provider_order_id: &str,
        provider_payment_id: String,
    ) -> Result<ReconcileResult, BookingError> {
        let order = self
            .store
            .find_order_by_provider_ref(provider_order_id)
            .await?
            .ok_or(BookingError::UnknownOrder)?;

        self.settle(order, provider_payment_id).await
    }

    async fn settle(
        &self,
        order: PaymentOrder,
        provider_payment_id: String,
    ) -> Result<ReconcileResult, BookingError> {
        // Idempotency guard: at most one SUCCESS entry per booking. The
        // guard still re-attempts the booking transition so a redelivery
        // converges a settlement interrupted after the ledger insert.
        if let Some(existing) = self.store.find_success_entry(order.booking_id).await? {
            let recovered = self
                .store
                .transition_booking(
                    order.booking_id,
                    BookingStatus::PendingPayment,
                    BookingStatus::Confirmed,
                )
                .await?;
            if recovered {
                metrics::record_booking_transition("PENDING_PAYMENT", "CONFIRMED");
                tracing::warn!(
                    booking_id = %order.booking_id,
                    entry_id = %existing.id,
                    "settled payment found with booking still awaiting payment; confirmed on redelivery"
                );
            } else {
                tracing::info!(
                    booking_id = %order.booking_id,
                    entry_id = %existing.id,
                    "duplicate settlement callback absorbed"
                );
            }
            let booking_status = self.booking_status(order.booking_id).await?;
            return Ok(ReconcileResult {
                outcome: ReconcileOutcome::AlreadyReconciled,
                entry: existing,
                booking_status,
            });
        }

        let entry = PaymentLedgerEntry::record(
            &order,
            LedgerEntryStatus::Success,
            Some(provider_payment_id),
            None,
        );
        self.store.insert_ledger_entry(entry.clone()).await?;
        self.store
            .set_order_status(order.id, PaymentOrderStatus::Consumed)
            .await?;
        metrics::record_payment_outcome("success");
        metrics::record_payment_amount(&order.currency, order.amount as u64);

        // State-checked transition: only applies while the booking is
        // still awaiting payment.
        let transitioned = self
            .store
            .transition_booking(
                order.booking_id,
                BookingStatus::PendingPayment,
                BookingStatus::Confirmed,
            )
            .await?;

        let booking_status = self.booking_status(order.booking_id).await?;

        if transitioned {
            metrics::record_booking_transition("PENDING_PAYMENT", "CONFIRMED");
            tracing::info!(
                booking_id = %order.booking_id,
                entry_id = %entry.id,
                "payment settled, booking confirmed"
            );
            Ok(ReconcileResult {
                outcome: ReconcileOutcome::Confirmed,
                entry,
                booking_status,
            })
        } else {
            // The payment was genuinely captured; keep the money on the
            // books and hand the case to manual reconciliation.
            metrics::record_payment_outcome("stale");
            tracing::warn!(
                booking_id = %order.booking_id,
                booking_status = %booking_status,
                entry_id = %entry.id,
                "payment captured for a booking no longer awaiting payment; manual follow-up required"
            );
            Ok(ReconcileResult {
                outcome: ReconcileOutcome::RecordedStale,
                entry,
                booking_status,
            })
        }
    }

    /// Record a verified failure or abandonment signal.
    ///
    /// The booking stays in PENDING_PAYMENT so the customer may retry; the
    /// retry opens a fresh order.
    pub async fn record_failure(
        &self,
        provider_order_id: &str,
        provider_payment_id: Option<String>,
        reason: Option<String>,
    ) -> Result<PaymentLedgerEntry, BookingError> {
        let order = self
            .store
            .find_order_by_provider_ref(provider_order_id)
            .await?
            .ok_or(BookingError::UnknownOrder)?;

        let entry = PaymentLedgerEntry::record(
            &order,
            LedgerEntryStatus::Failed,
            provider_payment_id,
            reason,
        );
        self.store.insert_ledger_entry(entry.clone()).await?;
        metrics::record_payment_outcome("failed");

        tracing::info!(
            booking_id = %order.booking_id,
            order_id = %order.id,
            "payment failure recorded; booking remains payable"
        );

        Ok(entry)
    }

    /// Record an authorized-but-uncaptured attempt reported by a webhook.
    pub async fn record_authorized(
        &self,
        provider_order_id: &str,
        provider_payment_id: String,
    ) -> Result<PaymentLedgerEntry, BookingError> {
        let order = self
            .store
            .find_order_by_provider_ref(provider_order_id)
            .await?
            .ok_or(BookingError::UnknownOrder)?;

        let entry = PaymentLedgerEntry::record(
            &order,
            LedgerEntryStatus::Pending,
            Some(provider_payment_id),
            None,
        );
        self.store.insert_ledger_entry(entry.clone()).await?;
        metrics::record_payment_outcome("pending");

        Ok(entry)
    }

    async fn booking_status(&self, booking_id: Uuid) -> Result<BookingStatus, BookingError> {
        Ok(self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound)?
            .status)
    }
}
