//! Payment endpoints: order opening, checkout verification and the
//! Razorpay webhook.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        OpenOrderRequest, OpenOrderResponse, PaymentFailureRequest, PaymentFailureResponse,
        VerifyPaymentRequest, VerifyPaymentResponse,
    },
    error::AppError,
    middleware::ActorContext,
    services::razorpay::CheckoutCallback,
    services::reconciler::ReconcileOutcome,
    AppState,
};

/// Open a payment order for a booking awaiting payment. Returns the
/// gateway order id and key id the frontend initializes checkout with.
pub async fn open_order(
    State(state): State<AppState>,
    ctx: ActorContext,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<OpenOrderRequest>,
) -> Result<(StatusCode, Json<OpenOrderResponse>), AppError> {
    payload.validate()?;

    let booking = state.bookings.get_booking(booking_id).await?;
    if !ctx.can_access(&booking.customer_id) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "booking belongs to another customer"
        )));
    }

    let order = state
        .reconciler
        .open_order(booking_id, payload.amount)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OpenOrderResponse {
            order_id: order.id,
            razorpay_order_id: order.provider_order_id,
            amount: order.amount,
            currency: order.currency,
            razorpay_key_id: state.razorpay.key_id().to_string(),
        }),
    ))
}

/// Verify a checkout success callback and settle it exactly once.
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    payload.validate()?;

    tracing::info!(
        razorpay_order_id = %payload.razorpay_order_id,
        razorpay_payment_id = %payload.razorpay_payment_id,
        "verifying checkout callback"
    );

    let result = state
        .reconciler
        .reconcile(CheckoutCallback {
            razorpay_order_id: payload.razorpay_order_id,
            razorpay_payment_id: payload.razorpay_payment_id,
            razorpay_signature: payload.razorpay_signature,
        })
        .await?;

    let outcome = match result.outcome {
        ReconcileOutcome::Confirmed => "confirmed",
        ReconcileOutcome::AlreadyReconciled => "already_reconciled",
        ReconcileOutcome::RecordedStale => "recorded_stale",
    };

    Ok(Json(VerifyPaymentResponse {
        booking_id: result.entry.booking_id,
        booking_status: result.booking_status,
        payment_status: result.entry.status,
        outcome: outcome.to_string(),
    }))
}

/// Record a client-reported checkout failure. The booking stays payable
/// and the customer may retry with a fresh order.
pub async fn payment_failure(
    State(state): State<AppState>,
    Json(payload): Json<PaymentFailureRequest>,
) -> Result<Json<PaymentFailureResponse>, AppError> {
    payload.validate()?;

    let entry = state
        .reconciler
        .record_failure(
            &payload.razorpay_order_id,
            payload.razorpay_payment_id,
            payload.reason,
        )
        .await?;

    Ok(Json(PaymentFailureResponse {
        booking_id: entry.booking_id,
        payment_status: entry.status,
        retriable: true,
    }))
}

/// Razorpay webhook endpoint.
///
/// The raw body HMAC is the gateway's proof for this path; nothing is
/// processed until it verifies. Events for orders we do not know are
/// logged and acknowledged so the gateway stops redelivering them.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get("X-Razorpay-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("missing X-Razorpay-Signature header");
            AppError::Unauthorized(anyhow::anyhow!("Missing webhook signature"))
        })?;

    state
        .razorpay
        .verify_webhook_signature(&body, signature)
        .map_err(AppError::from)?;

    let event = state.razorpay.parse_webhook_event(&body).map_err(|e| {
        tracing::error!(error = %e, "failed to parse webhook event");
        AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload"))
    })?;

    tracing::info!(event_type = %event.event, "processing Razorpay webhook");

    let payment = event.payload.payment.map(|p| p.entity);

    match (event.event.as_str(), payment) {
        ("payment.captured", Some(payment)) => {
            if let Some(order_id) = payment.order_id {
                if let Err(e) = state
                    .reconciler
                    .reconcile_captured(&order_id, payment.id)
                    .await
                {
                    tracing::error!(
                        order_id = %order_id,
                        error = %e,
                        "failed to settle captured payment from webhook"
                    );
                }
            }
        }
        ("payment.failed", Some(payment)) => {
            if let Some(order_id) = payment.order_id {
                if let Err(e) = state
                    .reconciler
                    .record_failure(&order_id, Some(payment.id), payment.error_description)
                    .await
                {
                    tracing::error!(
                        order_id = %order_id,
                        error = %e,
                        "failed to record failed payment from webhook"
                    );
                }
            }
        }
        ("payment.authorized", Some(payment)) => {
            if let Some(order_id) = payment.order_id {
                if let Err(e) = state
                    .reconciler
                    .record_authorized(&order_id, payment.id)
                    .await
                {
                    tracing::error!(
                        order_id = %order_id,
                        error = %e,
                        "failed to record authorized payment from webhook"
                    );
                }
            }
        }
        (event_type, _) => {
            tracing::debug!(event_type = %event_type, "unhandled webhook event type");
        }
    }

    // Always acknowledge verified deliveries.
    Ok(StatusCode::OK)
}
