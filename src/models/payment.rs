//! Payment order and ledger models.

use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a gateway-side payment intent. At most one order per
/// booking is `Opened` at a time; a retry opens a fresh order instead of
/// reusing a consumed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOrderStatus {
    Opened,
    Consumed,
    Expired,
}

/// A payment intent created in the gateway for one booking, tracked
/// locally by the gateway's order reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrder {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub booking_id: Uuid,
    /// Always equal to the booking's total at creation; enforced by the
    /// reconciler, never recomputed.
    pub amount: i64,
    pub currency: String,
    pub provider_order_id: String,
    pub status: PaymentOrderStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl PaymentOrder {
    pub fn open(booking_id: Uuid, amount: i64, currency: String, provider_order_id: String) -> Self {
        let now = DateTime::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            amount,
            currency,
            provider_order_id,
            status: PaymentOrderStatus::Opened,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryStatus {
    Pending,
    Success,
    Failed,
}

impl LedgerEntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for LedgerEntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record of one payment attempt. The ledger is append-only: a
/// failed or retried attempt produces a new entry, never an update of a
/// prior one. At most one SUCCESS entry may exist per booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLedgerEntry {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub order_id: Uuid,
    pub booking_id: Uuid,
    pub amount: i64,
    pub currency: String,
    /// Gateway name/method, e.g. "razorpay".
    pub payment_mode: String,
    pub provider_payment_id: Option<String>,
    /// Free-form context for the admin payments view, e.g. the gateway's
    /// failure description.
    pub note: Option<String>,
    pub status: LedgerEntryStatus,
    pub created_at: DateTime,
}

impl PaymentLedgerEntry {
    pub fn record(
        order: &PaymentOrder,
        status: LedgerEntryStatus,
        provider_payment_id: Option<String>,
        note: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: order.id,
            booking_id: order.booking_id,
            amount: order.amount,
            currency: order.currency.clone(),
            payment_mode: "razorpay".to_string(),
            provider_payment_id,
            note,
            status,
            created_at: DateTime::now(),
        }
    }
}
