//! Persistence for bookings, payment orders and the payment ledger.
//!
//! `BookingStore` is the seam between the booking/reconciliation logic and
//! MongoDB; tests drive the same logic against an in-memory implementation.

use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{bson::doc, Collection, Database, IndexModel};
use uuid::Uuid;

use crate::models::booking::{BookingRecord, BookingStatus};
use crate::models::payment::{PaymentLedgerEntry, PaymentOrder, PaymentOrderStatus};

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert_booking(&self, booking: BookingRecord) -> Result<()>;

    async fn get_booking(&self, id: Uuid) -> Result<Option<BookingRecord>>;

    /// Admin listing, newest first, with an optional status filter.
    /// Returns the page and the total matching count.
    async fn list_bookings(
        &self,
        status: Option<BookingStatus>,
        limit: i64,
        offset: u64,
    ) -> Result<(Vec<BookingRecord>, i64)>;

    /// Compare-and-set status transition: the update only applies while the
    /// booking is still in `from`. Returns false when no document matched,
    /// i.e. the precondition no longer holds.
    async fn transition_booking(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool>;

    async fn insert_order(&self, order: PaymentOrder) -> Result<()>;

    async fn find_order_by_provider_ref(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<PaymentOrder>>;

    async fn find_open_order(&self, booking_id: Uuid) -> Result<Option<PaymentOrder>>;

    async fn set_order_status(&self, id: Uuid, status: PaymentOrderStatus) -> Result<()>;

    /// Expire every still-open order for a booking. Used when a booking is
    /// cancelled and when a fresh order supersedes an abandoned one.
    async fn expire_open_orders(&self, booking_id: Uuid) -> Result<u64>;

    async fn insert_ledger_entry(&self, entry: PaymentLedgerEntry) -> Result<()>;

    async fn find_success_entry(&self, booking_id: Uuid) -> Result<Option<PaymentLedgerEntry>>;

    async fn list_ledger_entries(&self, booking_id: Uuid) -> Result<Vec<PaymentLedgerEntry>>;
}

#[derive(Clone)]
pub struct MongoStore {
    bookings: Collection<BookingRecord>,
    orders: Collection<PaymentOrder>,
    ledger: Collection<PaymentLedgerEntry>,
}

impl MongoStore {
    pub fn new(db: &Database) -> Self {
        Self {
            bookings: db.collection("bookings"),
            orders: db.collection("payment_orders"),
            ledger: db.collection("payment_ledger"),
        }
    }

    /// Initialize database indexes.
    pub async fn init_indexes(&self) -> Result<()> {
        let booking_status_index = IndexModel::builder()
            .keys(doc! { "status": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("booking_status_idx".to_string())
                    .build(),
            )
            .build();

        let booking_customer_index = IndexModel::builder()
            .keys(doc! { "customer_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("booking_customer_idx".to_string())
                    .build(),
            )
            .build();

        self.bookings
            .create_indexes([booking_status_index, booking_customer_index], None)
            .await?;

        // Gateway order references are globally unique; a duplicate insert
        // is a bug, not data.
        let provider_ref_index = IndexModel::builder()
            .keys(doc! { "provider_order_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("order_provider_ref_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let order_booking_index = IndexModel::builder()
            .keys(doc! { "booking_id": 1, "status": 1 })
            .options(
                IndexOptions::builder()
                    .name("order_booking_idx".to_string())
                    .build(),
            )
            .build();

        self.orders
            .create_indexes([provider_ref_index, order_booking_index], None)
            .await?;

        // Database-level backstop for the at-most-one-SUCCESS invariant:
        // unique on booking_id, restricted to SUCCESS entries.
        let success_entry_index = IndexModel::builder()
            .keys(doc! { "booking_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("ledger_success_unique_idx".to_string())
                    .unique(true)
                    .partial_filter_expression(doc! { "status": "SUCCESS" })
                    .build(),
            )
            .build();

        let ledger_booking_index = IndexModel::builder()
            .keys(doc! { "booking_id": 1, "created_at": 1 })
            .options(
                IndexOptions::builder()
                    .name("ledger_booking_idx".to_string())
                    .build(),
            )
            .build();

        self.ledger
            .create_indexes([success_entry_index, ledger_booking_index], None)
            .await?;

        tracing::info!("Booking service indexes initialized");
        Ok(())
    }
}

#[async_trait]
impl BookingStore for MongoStore {
    async fn insert_booking(&self, booking: BookingRecord) -> Result<()> {
        self.bookings.insert_one(booking, None).await?;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<BookingRecord>> {
        let filter = doc! { "_id": id.to_string() };
        Ok(self.bookings.find_one(filter, None).await?)
    }

    async fn list_bookings(
        &self,
        status: Option<BookingStatus>,
        limit: i64,
        offset: u64,
    ) -> Result<(Vec<BookingRecord>, i64)> {
        let mut filter = doc! {};
        if let Some(status) = status {
            filter.insert("status", status.as_str());
        }

        let total_count = self.bookings.count_documents(filter.clone(), None).await? as i64;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(offset)
            .limit(limit)
            .build();

        let cursor = self.bookings.find(filter, Some(options)).await?;
        let bookings: Vec<BookingRecord> = cursor.try_collect().await?;

        Ok((bookings, total_count))
    }

    async fn transition_booking(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool> {
        let filter = doc! {
            "_id": id.to_string(),
            "status": from.as_str(),
        };
        let update = doc! {
            "$set": {
                "status": to.as_str(),
                "updated_at": mongodb::bson::DateTime::now(),
            }
        };
        let result = self.bookings.update_one(filter, update, None).await?;
        Ok(result.matched_count == 1)
    }

    async fn insert_order(&self, order: PaymentOrder) -> Result<()> {
        self.orders.insert_one(order, None).await?;
        Ok(())
    }

    async fn find_order_by_provider_ref(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<PaymentOrder>> {
        let filter = doc! { "provider_order_id": provider_order_id };
        Ok(self.orders.find_one(filter, None).await?)
    }

    async fn find_open_order(&self, booking_id: Uuid) -> Result<Option<PaymentOrder>> {
        let filter = doc! {
            "booking_id": booking_id.to_string(),
            "status": "OPENED",
        };
        Ok(self.orders.find_one(filter, None).await?)
    }

    async fn set_order_status(&self, id: Uuid, status: PaymentOrderStatus) -> Result<()> {
        let filter = doc! { "_id": id.to_string() };
        let update = doc! {
            "$set": {
                "status": mongodb::bson::to_bson(&status)?,
                "updated_at": mongodb::bson::DateTime::now(),
            }
        };
        self.orders.update_one(filter, update, None).await?;
        Ok(())
    }

    async fn expire_open_orders(&self, booking_id: Uuid) -> Result<u64> {
        let filter = doc! {
            "booking_id": booking_id.to_string(),
            "status": "OPENED",
        };
        let update = doc! {
            "$set": {
                "status": "EXPIRED",
                "updated_at": mongodb::bson::DateTime::now(),
            }
        };
        let result = self.orders.update_many(filter, update, None).await?;
        Ok(result.modified_count)
    }

    async fn insert_ledger_entry(&self, entry: PaymentLedgerEntry) -> Result<()> {
        self.ledger.insert_one(entry, None).await?;
        Ok(())
    }

    async fn find_success_entry(&self, booking_id: Uuid) -> Result<Option<PaymentLedgerEntry>> {
        let filter = doc! {
            "booking_id": booking_id.to_string(),
            "status": "SUCCESS",
        };
        Ok(self.ledger.find_one(filter, None).await?)
    }

    async fn list_ledger_entries(&self, booking_id: Uuid) -> Result<Vec<PaymentLedgerEntry>> {
        let filter = doc! { "booking_id": booking_id.to_string() };
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1 })
            .build();
        let cursor = self.ledger.find(filter, Some(options)).await?;
        Ok(cursor.try_collect().await?)
    }
}
