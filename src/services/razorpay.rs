//! Razorpay gateway client.
//!
//! Creates payment orders through the Orders API and verifies the
//! HMAC-SHA256 proofs Razorpay attaches to checkout callbacks and
//! webhook deliveries. Verification is a security boundary: the
//! reconciler trusts nothing a client forwards until the signature
//! checks out against the shared secret.

use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::RazorpayConfig;
use crate::error::BookingError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    config: RazorpayConfig,
}

/// Body of an Orders API create call. Amount is in minor units (paise).
#[derive(Debug, Serialize)]
struct CreateOrderBody {
    amount: u64,
    currency: String,
    receipt: Option<String>,
}

/// The subset of Razorpay's order entity the service consumes.
#[derive(Debug, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    pub status: String,
    pub receipt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    code: String,
    description: String,
}

/// Fields a successful checkout hands back to the client, which the
/// client forwards to us for verification.
#[derive(Debug, Clone)]
pub struct CheckoutCallback {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// A webhook delivery, already decoded. The raw body must have passed
/// `verify_webhook_signature` before this is acted on.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub payload: WebhookPayload,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<WebhookPaymentEntity>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPaymentEntity {
    pub entity: WebhookPayment,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayment {
    pub id: String,
    pub order_id: Option<String>,
    pub amount: u64,
    pub status: String,
    pub error_description: Option<String>,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn key_id(&self) -> &str {
        &self.config.key_id
    }

    pub fn is_configured(&self) -> bool {
        !self.config.key_id.is_empty() && !self.config.key_secret.expose_secret().is_empty()
    }

    /// Create an order in the gateway for `amount` minor units. The
    /// returned order id is what the frontend checkout is initialized
    /// with and what callbacks reference.
    pub async fn create_order(
        &self,
        amount: u64,
        currency: &str,
        receipt: Option<String>,
    ) -> Result<GatewayOrder> {
        if !self.is_configured() {
            return Err(anyhow!("Razorpay credentials not configured"));
        }

        let url = format!("{}/orders", self.config.api_base_url);
        let body = CreateOrderBody {
            amount,
            currency: currency.to_string(),
            receipt,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            let order: GatewayOrder = serde_json::from_str(&text)?;
            tracing::info!(
                order_id = %order.id,
                amount = order.amount,
                currency = %order.currency,
                "Razorpay order created"
            );
            Ok(order)
        } else {
            let detail = serde_json::from_str::<GatewayErrorBody>(&text)
                .map(|e| format!("{} - {}", e.error.code, e.error.description))
                .unwrap_or(text);
            tracing::error!(status = %status, detail = %detail, "Razorpay order creation failed");
            Err(anyhow!("Razorpay error: {}", detail))
        }
    }

    /// Verify a checkout callback. Razorpay signs
    /// `order_id + "|" + payment_id` with the key secret; any mismatch
    /// fails closed.
    pub fn verify_checkout_signature(&self, callback: &CheckoutCallback) -> Result<(), BookingError> {
        let payload = format!(
            "{}|{}",
            callback.razorpay_order_id, callback.razorpay_payment_id
        );
        let expected = self.sign(&payload, self.config.key_secret.expose_secret());

        if expected == callback.razorpay_signature {
            Ok(())
        } else {
            tracing::warn!(
                order_id = %callback.razorpay_order_id,
                payment_id = %callback.razorpay_payment_id,
                "checkout signature verification failed"
            );
            Err(BookingError::SignatureInvalid)
        }
    }

    /// Verify a webhook delivery. Razorpay signs the raw request body
    /// with the webhook secret.
    pub fn verify_webhook_signature(&self, body: &str, signature: &str) -> Result<(), BookingError> {
        let expected = self.sign(body, self.config.webhook_secret.expose_secret());
        if expected == signature {
            Ok(())
        } else {
            tracing::warn!("webhook signature verification failed");
            Err(BookingError::SignatureInvalid)
        }
    }

    pub fn parse_webhook_event(&self, body: &str) -> Result<WebhookEvent> {
        Ok(serde_json::from_str(body)?)
    }

    fn sign(&self, payload: &str, secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}
