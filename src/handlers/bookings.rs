//! Booking endpoints: creation, lookup, admin listing and the status
//! transition commands exposed to customers and the admin console.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use mongodb::bson::DateTime;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        BookingListResponse, BookingResponse, CreateBookingRequest, LedgerEntryResponse,
        ListBookingsQuery,
    },
    error::AppError,
    middleware::ActorContext,
    models::booking::{Actor, BookingStatus},
    pricing::{DurationTier, RentalOffer},
    services::bookings::CreateBooking,
    AppState,
};

/// Create a booking from a catalog offer. The quote is computed and
/// frozen here; payment happens against the returned total.
pub async fn create_booking(
    State(state): State<AppState>,
    ctx: ActorContext,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    payload.validate()?;

    let customer_id = ctx.customer_id.clone().ok_or_else(|| {
        AppError::Forbidden(anyhow::anyhow!("bookings are created on behalf of a customer"))
    })?;

    let tier = DurationTier::parse(&payload.duration_tier)?;

    let booking = state
        .bookings
        .create_booking(CreateBooking {
            customer_id,
            offer: RentalOffer {
                bike_id: payload.bike_id,
                daily_rate: payload.daily_rate,
                weekly_rate: payload.weekly_rate,
            },
            tier,
            pickup_at: DateTime::from_millis(payload.pickup_at.timestamp_millis()),
            pickup_mode: payload.pickup_mode,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(BookingResponse::from(booking))))
}

pub async fn get_booking(
    State(state): State<AppState>,
    ctx: ActorContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.bookings.get_booking(booking_id).await?;

    if !ctx.can_access(&booking.customer_id) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "booking belongs to another customer"
        )));
    }

    Ok(Json(BookingResponse::from(booking)))
}

/// Admin listing with optional status filter and pagination.
pub async fn list_bookings(
    State(state): State<AppState>,
    ctx: ActorContext,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<BookingListResponse>, AppError> {
    require_admin(&ctx)?;

    let status = query
        .status
        .as_deref()
        .map(parse_status)
        .transpose()?;
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0);

    let (bookings, total_count) = state.bookings.list_bookings(status, limit, offset).await?;

    Ok(Json(BookingListResponse {
        bookings: bookings.into_iter().map(BookingResponse::from).collect(),
        total_count,
    }))
}

/// Cancel before pickup. Customers may cancel their own booking;
/// administrators may cancel any.
pub async fn cancel_booking(
    State(state): State<AppState>,
    ctx: ActorContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.bookings.get_booking(booking_id).await?;
    if !ctx.can_access(&booking.customer_id) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "booking belongs to another customer"
        )));
    }

    let booking = state.bookings.cancel(booking_id, ctx.actor).await?;
    Ok(Json(BookingResponse::from(booking)))
}

/// Administrative pickup confirmation.
pub async fn confirm_pickup(
    State(state): State<AppState>,
    ctx: ActorContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    require_admin(&ctx)?;
    let booking = state.bookings.confirm_pickup(booking_id, Actor::Admin).await?;
    Ok(Json(BookingResponse::from(booking)))
}

/// Administrative drop-off confirmation.
pub async fn confirm_dropoff(
    State(state): State<AppState>,
    ctx: ActorContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    require_admin(&ctx)?;
    let booking = state
        .bookings
        .confirm_dropoff(booking_id, Actor::Admin)
        .await?;
    Ok(Json(BookingResponse::from(booking)))
}

/// Payment attempt history for one booking, for the admin payments view.
pub async fn booking_payments(
    State(state): State<AppState>,
    ctx: ActorContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Vec<LedgerEntryResponse>>, AppError> {
    require_admin(&ctx)?;
    let entries = state.bookings.ledger(booking_id).await?;
    Ok(Json(
        entries.into_iter().map(LedgerEntryResponse::from).collect(),
    ))
}

fn require_admin(ctx: &ActorContext) -> Result<(), AppError> {
    if ctx.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(anyhow::anyhow!(
            "administrator role required"
        )))
    }
}

fn parse_status(value: &str) -> Result<BookingStatus, AppError> {
    match value {
        "PENDING_PAYMENT" => Ok(BookingStatus::PendingPayment),
        "CONFIRMED" => Ok(BookingStatus::Confirmed),
        "ONGOING" => Ok(BookingStatus::Ongoing),
        "COMPLETED" => Ok(BookingStatus::Completed),
        "CANCELLED" => Ok(BookingStatus::Cancelled),
        other => Err(AppError::BadRequest(anyhow::anyhow!(
            "unknown booking status: {}",
            other
        ))),
    }
}
