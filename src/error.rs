//! Error types for the booking service.
//!
//! `BookingError` is the domain taxonomy produced by the pricing engine,
//! the booking state machine and the payment reconciler. `AppError` is the
//! HTTP-facing wrapper that maps each failure onto a conventional status
//! code without leaking internal variant names to customers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::booking::BookingStatus;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("unknown rental duration tier: {0}")]
    InvalidDurationTier(String),

    #[error("rental rate must be non-negative")]
    InvalidRate,

    #[error("payment amount does not match the booked total")]
    AmountMismatch { expected: i64, got: i64 },

    #[error("booking is not awaiting payment")]
    BookingNotPayable { status: BookingStatus },

    #[error("no payment order known for the given gateway reference")]
    UnknownOrder,

    #[error("payment signature verification failed")]
    SignatureInvalid,

    #[error("illegal booking transition {from} -> {to}")]
    IllegalStateTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("booking state changed underneath the operation")]
    StaleBookingState,

    #[error("booking not found")]
    BookingNotFound,

    #[error("payment gateway error: {0}")]
    Gateway(anyhow::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Bad Gateway: {0}")]
    BadGateway(String),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::InvalidDurationTier(_) | BookingError::InvalidRate => {
                AppError::BadRequest(anyhow::Error::new(err))
            }
            BookingError::AmountMismatch { .. } => AppError::BadRequest(anyhow::Error::new(err)),
            BookingError::BookingNotPayable { .. }
            | BookingError::IllegalStateTransition { .. }
            | BookingError::StaleBookingState => AppError::Conflict(anyhow::Error::new(err)),
            BookingError::UnknownOrder | BookingError::BookingNotFound => {
                AppError::NotFound(anyhow::Error::new(err))
            }
            BookingError::SignatureInvalid => AppError::Unauthorized(anyhow::Error::new(err)),
            BookingError::Gateway(err) => AppError::BadGateway(format!("{:#}", err)),
            BookingError::Storage(err) => AppError::InternalError(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
        }

        let (status, error_message, details) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation error".to_string(),
                Some(err.to_string()),
            ),
            AppError::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string(), None),
            AppError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string(), None),
            AppError::Unauthorized(err) => (StatusCode::UNAUTHORIZED, err.to_string(), None),
            AppError::Forbidden(err) => (StatusCode::FORBIDDEN, err.to_string(), None),
            AppError::Conflict(err) => (StatusCode::CONFLICT, err.to_string(), None),
            AppError::InternalError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                Some(format!("{:#}", err)),
            ),
            AppError::BadGateway(msg) => (
                StatusCode::BAD_GATEWAY,
                format!("Bad Gateway: {}", msg),
                None,
            ),
            AppError::DatabaseError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                Some(err.to_string()),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: error_message,
                details,
            }),
        )
            .into_response()
    }
}
