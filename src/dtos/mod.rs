//! Request and response DTOs for the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::booking::{BookingRecord, BookingStatus, PickupMode};
use crate::models::payment::{LedgerEntryStatus, PaymentLedgerEntry};

/// Booking creation request. Rate fields are supplied by the catalog in
/// minor units; the duration tier is validated against the enumerated set.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    #[validate(length(min = 1))]
    pub bike_id: String,
    #[validate(range(min = 0))]
    pub daily_rate: i64,
    pub weekly_rate: Option<i64>,
    /// "1-day" or "7-day".
    #[validate(length(min = 1))]
    pub duration_tier: String,
    pub pickup_at: DateTime<Utc>,
    pub pickup_mode: PickupMode,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub customer_id: String,
    pub bike_id: String,
    pub duration_tier: String,
    pub pickup_at: String,
    pub drop_at: String,
    pub pickup_mode: PickupMode,
    pub base_amount: i64,
    pub discount_amount: i64,
    pub tax_amount: i64,
    pub total_amount: i64,
    pub currency: String,
    pub status: BookingStatus,
    pub created_at: String,
}

impl From<BookingRecord> for BookingResponse {
    fn from(b: BookingRecord) -> Self {
        Self {
            id: b.id,
            customer_id: b.customer_id,
            bike_id: b.bike_id,
            duration_tier: b.duration_tier.as_str().to_string(),
            pickup_at: b.pickup_at.to_string(),
            drop_at: b.drop_at.to_string(),
            pickup_mode: b.pickup_mode,
            base_amount: b.base_amount,
            discount_amount: b.discount_amount,
            tax_amount: b.tax_amount,
            total_amount: b.total_amount,
            currency: b.currency,
            status: b.status,
            created_at: b.created_at.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingResponse>,
    pub total_count: i64,
}

/// Open a payment order. The caller re-states the amount it displayed to
/// the customer; it must equal the booking's frozen total.
#[derive(Debug, Deserialize, Validate)]
pub struct OpenOrderRequest {
    #[validate(range(min = 0))]
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct OpenOrderResponse {
    pub order_id: Uuid,
    /// Gateway order id to initialize checkout with.
    pub razorpay_order_id: String,
    pub amount: i64,
    pub currency: String,
    /// Key id for frontend checkout initialization.
    pub razorpay_key_id: String,
}

/// Checkout success callback forwarded by the client for verification.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1))]
    pub razorpay_signature: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub booking_id: Uuid,
    pub booking_status: BookingStatus,
    pub payment_status: LedgerEntryStatus,
    /// "confirmed", "already_reconciled" or "recorded_stale".
    pub outcome: String,
}

/// Client-reported checkout failure or abandonment.
#[derive(Debug, Deserialize, Validate)]
pub struct PaymentFailureRequest {
    #[validate(length(min = 1))]
    pub razorpay_order_id: String,
    pub razorpay_payment_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentFailureResponse {
    pub booking_id: Uuid,
    pub payment_status: LedgerEntryStatus,
    /// The booking stays payable; the client may open a fresh order.
    pub retriable: bool,
}

#[derive(Debug, Serialize)]
pub struct LedgerEntryResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub payment_mode: String,
    pub provider_payment_id: Option<String>,
    pub note: Option<String>,
    pub status: LedgerEntryStatus,
    pub created_at: String,
}

impl From<PaymentLedgerEntry> for LedgerEntryResponse {
    fn from(e: PaymentLedgerEntry) -> Self {
        Self {
            id: e.id,
            order_id: e.order_id,
            amount: e.amount,
            currency: e.currency,
            payment_mode: e.payment_mode,
            provider_payment_id: e.provider_payment_id,
            note: e.note,
            status: e.status,
            created_at: e.created_at.to_string(),
        }
    }
}
