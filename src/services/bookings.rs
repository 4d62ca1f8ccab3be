//! Booking workflow: quote-and-create plus status transitions.

use std::sync::Arc;

use mongodb::bson::DateTime;
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::booking::{Actor, BookingRecord, BookingStatus, PickupMode};
use crate::models::payment::PaymentLedgerEntry;
use crate::pricing::{DurationTier, PricingEngine, RentalOffer};
use crate::services::metrics;
use crate::services::store::BookingStore;

/// Validated input for creating a booking. The rate fields come from the
/// catalog; the quote is computed here and frozen on the record.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub customer_id: String,
    pub offer: RentalOffer,
    pub tier: DurationTier,
    pub pickup_at: DateTime,
    pub pickup_mode: PickupMode,
}

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    pricing: PricingEngine,
    currency: String,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, pricing: PricingEngine, currency: String) -> Self {
        Self {
            store,
            pricing,
            currency,
        }
    }

    /// Quote the offer and persist the booking in PENDING_PAYMENT with the
    /// quoted amounts frozen. The drop-off time follows from the tier.
    pub async fn create_booking(&self, input: CreateBooking) -> Result<BookingRecord, BookingError> {
        let quote = self.pricing.quote(&input.offer, input.tier)?;

        let drop_at = DateTime::from_millis(
            input.pickup_at.timestamp_millis() + input.tier.days() * 86_400_000,
        );

        let booking = BookingRecord::new(
            input.customer_id,
            input.offer.bike_id.clone(),
            input.tier,
            input.pickup_at,
            drop_at,
            input.pickup_mode,
            quote,
            self.currency.clone(),
        );

        self.store.insert_booking(booking.clone()).await?;

        tracing::info!(
            booking_id = %booking.id,
            bike_id = %booking.bike_id,
            tier = %booking.duration_tier,
            total = booking.total_amount,
            "booking created"
        );

        Ok(booking)
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<BookingRecord, BookingError> {
        self.store
            .get_booking(id)
            .await?
            .ok_or(BookingError::BookingNotFound)
    }

    pub async fn list_bookings(
        &self,
        status: Option<BookingStatus>,
        limit: i64,
        offset: u64,
    ) -> Result<(Vec<BookingRecord>, i64), BookingError> {
        Ok(self.store.list_bookings(status, limit, offset).await?)
    }

    /// Cancel before pickup. Legal from PENDING_PAYMENT or CONFIRMED for
    /// both customers and administrators; any still-open payment order is
    /// expired as part of the same transition.
    pub async fn cancel(&self, id: Uuid, actor: Actor) -> Result<BookingRecord, BookingError> {
        let booking = self.transition(id, BookingStatus::Cancelled, actor).await?;

        let expired = self.store.expire_open_orders(id).await?;
        if expired > 0 {
            tracing::info!(booking_id = %id, expired, "open payment orders expired on cancellation");
        }

        Ok(booking)
    }

    /// Administrative pickup confirmation: CONFIRMED -> ONGOING.
    pub async fn confirm_pickup(&self, id: Uuid, actor: Actor) -> Result<BookingRecord, BookingError> {
        self.transition(id, BookingStatus::Ongoing, actor).await
    }

    /// Administrative drop-off confirmation: ONGOING -> COMPLETED.
    pub async fn confirm_dropoff(
        &self,
        id: Uuid,
        actor: Actor,
    ) -> Result<BookingRecord, BookingError> {
        self.transition(id, BookingStatus::Completed, actor).await
    }

    /// Payment attempt history for the admin payments view.
    pub async fn ledger(&self, booking_id: Uuid) -> Result<Vec<PaymentLedgerEntry>, BookingError> {
        // 404 for a booking that never existed, empty history otherwise.
        self.get_booking(booking_id).await?;
        Ok(self.store.list_ledger_entries(booking_id).await?)
    }

    /// Apply one state-machine edge with an optimistic, state-checked
    /// write: the table is checked against the status read here, and the
    /// store only commits while that status still holds.
    async fn transition(
        &self,
        id: Uuid,
        to: BookingStatus,
        actor: Actor,
    ) -> Result<BookingRecord, BookingError> {
        let booking = self.get_booking(id).await?;
        let from = booking.status;

        from.transition_to(to, actor)?;

        let applied = self.store.transition_booking(id, from, to).await?;
        if !applied {
            // Lost the race: re-check under the current status so callers
            // get IllegalStateTransition when the new state forbids the
            // edge, and StaleBookingState only for a genuine interleaving.
            let current = self.get_booking(id).await?.status;
            current.transition_to(to, actor)?;
            return Err(BookingError::StaleBookingState);
        }

        metrics::record_booking_transition(from.as_str(), to.as_str());
        tracing::info!(booking_id = %id, from = %from, to = %to, "booking transitioned");

        self.get_booking(id).await
    }
}
