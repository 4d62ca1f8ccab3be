//! Actor context extractor.
//!
//! Identifies who is calling (customer or administrator) from request
//! headers set by the authenticating frontend after session validation.
//! The core accepts these as plain parameters; session handling itself is
//! an external collaborator concern.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::models::booking::Actor;

/// Caller identity extracted from request headers.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub actor: Actor,
    /// Present for customer calls; admins act on any booking.
    pub customer_id: Option<String>,
}

impl ActorContext {
    pub fn is_admin(&self) -> bool {
        self.actor == Actor::Admin
    }

    /// Whether this caller may read the given customer's booking.
    pub fn can_access(&self, customer_id: &str) -> bool {
        self.is_admin() || self.customer_id.as_deref() == Some(customer_id)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let role = parts
            .headers
            .get("X-Actor-Role")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing X-Actor-Role header"))
            })?;

        let actor = match role {
            "customer" => Actor::Customer,
            "admin" => Actor::Admin,
            other => {
                return Err(AppError::Unauthorized(anyhow::anyhow!(
                    "Unknown actor role: {}",
                    other
                )))
            }
        };

        let customer_id = parts
            .headers
            .get("X-Customer-ID")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        if actor == Actor::Customer && customer_id.is_none() {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Missing X-Customer-ID header for customer request"
            )));
        }

        Ok(ActorContext { actor, customer_id })
    }
}
