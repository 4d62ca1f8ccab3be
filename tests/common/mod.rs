#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::Secret;
use sha2::Sha256;
use uuid::Uuid;

use booking_service::config::{
    Config, DatabaseConfig, PricingConfig, RazorpayConfig, ServerConfig,
};
use booking_service::models::booking::{BookingRecord, BookingStatus};
use booking_service::models::payment::{
    LedgerEntryStatus, PaymentLedgerEntry, PaymentOrder, PaymentOrderStatus,
};
use booking_service::services::BookingStore;
use booking_service::startup::{AppState, Application};

pub const TEST_KEY_SECRET: &str = "test_key_secret";
pub const TEST_WEBHOOK_SECRET: &str = "test_webhook_secret";
pub const TEST_CUSTOMER_ID: &str = "cust-1";

/// In-memory BookingStore so booking and reconciliation logic can be
/// exercised without a running MongoDB.
#[derive(Default)]
pub struct InMemoryStore {
    bookings: Mutex<HashMap<Uuid, BookingRecord>>,
    orders: Mutex<Vec<PaymentOrder>>,
    ledger: Mutex<Vec<PaymentLedgerEntry>>,
}

impl InMemoryStore {
    pub fn open_order_count(&self, booking_id: Uuid) -> usize {
        self.orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.booking_id == booking_id && o.status == PaymentOrderStatus::Opened)
            .count()
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn ledger_statuses(&self, booking_id: Uuid) -> Vec<LedgerEntryStatus> {
        self.ledger
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.booking_id == booking_id)
            .map(|e| e.status)
            .collect()
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn insert_booking(&self, booking: BookingRecord) -> Result<()> {
        self.bookings.lock().unwrap().insert(booking.id, booking);
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<BookingRecord>> {
        Ok(self.bookings.lock().unwrap().get(&id).cloned())
    }

    async fn list_bookings(
        &self,
        status: Option<BookingStatus>,
        limit: i64,
        offset: u64,
    ) -> Result<(Vec<BookingRecord>, i64)> {
        let bookings = self.bookings.lock().unwrap();
        let mut matching: Vec<BookingRecord> = bookings
            .values()
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        matching.sort_by_key(|b| std::cmp::Reverse(b.created_at));
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn transition_booking(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool> {
        let mut bookings = self.bookings.lock().unwrap();
        match bookings.get_mut(&id) {
            Some(booking) if booking.status == from => {
                booking.status = to;
                booking.updated_at = mongodb::bson::DateTime::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_order(&self, order: PaymentOrder) -> Result<()> {
        self.orders.lock().unwrap().push(order);
        Ok(())
    }

    async fn find_order_by_provider_ref(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<PaymentOrder>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.provider_order_id == provider_order_id)
            .cloned())
    }

    async fn find_open_order(&self, booking_id: Uuid) -> Result<Option<PaymentOrder>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.booking_id == booking_id && o.status == PaymentOrderStatus::Opened)
            .cloned())
    }

    async fn set_order_status(&self, id: Uuid, status: PaymentOrderStatus) -> Result<()> {
        let mut orders = self.orders.lock().unwrap();
        if let Some(order) = orders.iter_mut().find(|o| o.id == id) {
            order.status = status;
            order.updated_at = mongodb::bson::DateTime::now();
        }
        Ok(())
    }

    async fn expire_open_orders(&self, booking_id: Uuid) -> Result<u64> {
        let mut orders = self.orders.lock().unwrap();
        let mut expired = 0;
        for order in orders
            .iter_mut()
            .filter(|o| o.booking_id == booking_id && o.status == PaymentOrderStatus::Opened)
        {
            order.status = PaymentOrderStatus::Expired;
            order.updated_at = mongodb::bson::DateTime::now();
            expired += 1;
        }
        Ok(expired)
    }

    async fn insert_ledger_entry(&self, entry: PaymentLedgerEntry) -> Result<()> {
        self.ledger.lock().unwrap().push(entry);
        Ok(())
    }

    async fn find_success_entry(&self, booking_id: Uuid) -> Result<Option<PaymentLedgerEntry>> {
        Ok(self
            .ledger
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.booking_id == booking_id && e.status == LedgerEntryStatus::Success)
            .cloned())
    }

    async fn list_ledger_entries(&self, booking_id: Uuid) -> Result<Vec<PaymentLedgerEntry>> {
        Ok(self
            .ledger
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.booking_id == booking_id)
            .cloned()
            .collect())
    }
}

/// Test configuration pointing the gateway client at `gateway_base_url`
/// (a wiremock server in tests that create orders).
pub fn test_config(gateway_base_url: &str) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            url: Secret::new("mongodb://localhost:27017".to_string()),
            db_name: "booking_test".to_string(),
        },
        razorpay: RazorpayConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: Secret::new(TEST_KEY_SECRET.to_string()),
            webhook_secret: Secret::new(TEST_WEBHOOK_SECRET.to_string()),
            api_base_url: gateway_base_url.to_string(),
        },
        pricing: PricingConfig {
            currency: "INR".to_string(),
            tax_rate_bps: 1800,
            weekly_discount_bps: 1000,
        },
        service_name: "booking-service-test".to_string(),
    }
}

/// Compute the gateway's HMAC-SHA256 hex signature, for forging valid
/// callbacks in tests.
pub fn sign(payload: &str, secret: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
}

impl TestApp {
    /// Spawn the full HTTP application over an in-memory store.
    pub async fn spawn(gateway_base_url: &str) -> Self {
        let store = Arc::new(InMemoryStore::default());
        let state = AppState::new(test_config(gateway_base_url), store.clone());

        let app = Application::with_state(state)
            .await
            .expect("Failed to build test application");
        let address = format!("http://127.0.0.1:{}", app.port());

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        TestApp { address, store }
    }
}
