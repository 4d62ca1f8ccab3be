//! Booking record and its status state machine.
//!
//! A booking is created once, at quote time, with its amounts frozen. It is
//! mutated only through status transitions and never physically deleted;
//! cancellation is a transition, not a removal.

use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BookingError;
use crate::pricing::{DurationTier, Quote};

/// Who is requesting a transition. The state machine admits different
/// edges for customers, administrators and the reconciler itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer,
    Admin,
    /// The payment reconciler, confirming a booking after settlement.
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    Ongoing,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        Self::PendingPayment,
        Self::Confirmed,
        Self::Ongoing,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "PENDING_PAYMENT",
            Self::Confirmed => "CONFIRMED",
            Self::Ongoing => "ONGOING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Check one edge of the transition table.
    ///
    /// | from            | to        | actor          |
    /// |-----------------|-----------|----------------|
    /// | PENDING_PAYMENT | CONFIRMED | system         |
    /// | PENDING_PAYMENT | CANCELLED | customer/admin |
    /// | CONFIRMED       | ONGOING   | admin          |
    /// | CONFIRMED       | CANCELLED | customer/admin |
    /// | ONGOING         | COMPLETED | admin          |
    ///
    /// Any other edge fails with `IllegalStateTransition` and the caller
    /// must leave the record unchanged.
    pub fn transition_to(self, to: BookingStatus, actor: Actor) -> Result<(), BookingError> {
        use BookingStatus::*;

        let allowed = match (self, to) {
            (PendingPayment, Confirmed) => actor == Actor::System,
            (PendingPayment, Cancelled) => matches!(actor, Actor::Customer | Actor::Admin),
            (Confirmed, Ongoing) => actor == Actor::Admin,
            (Confirmed, Cancelled) => matches!(actor, Actor::Customer | Actor::Admin),
            (Ongoing, Completed) => actor == Actor::Admin,
            _ => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(BookingError::IllegalStateTransition { from: self, to })
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the customer takes delivery of the bike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PickupMode {
    /// Pickup at a rental station.
    Station { location_id: String },
    /// Doorstep delivery to a customer address.
    Doorstep { address: String },
}

/// One rental reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRecord {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub customer_id: String,
    pub bike_id: String,
    pub duration_tier: DurationTier,
    pub pickup_at: DateTime,
    pub drop_at: DateTime,
    pub pickup_mode: PickupMode,
    /// Quote snapshot in minor units, frozen at creation. The customer is
    /// charged what was quoted even if published rates change later.
    pub base_amount: i64,
    pub discount_amount: i64,
    pub tax_amount: i64,
    pub total_amount: i64,
    pub currency: String,
    pub status: BookingStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl BookingRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        customer_id: String,
        bike_id: String,
        tier: DurationTier,
        pickup_at: DateTime,
        drop_at: DateTime,
        pickup_mode: PickupMode,
        quote: Quote,
        currency: String,
    ) -> Self {
        let now = DateTime::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            bike_id,
            duration_tier: tier,
            pickup_at,
            drop_at,
            pickup_mode,
            base_amount: quote.base,
            discount_amount: quote.discount,
            tax_amount: quote.tax,
            total_amount: quote.total,
            currency,
            status: BookingStatus::PendingPayment,
            created_at: now,
            updated_at: now,
        }
    }
}
