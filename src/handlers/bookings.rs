use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::services::bookings::{self, CreateBookingInput, CreateBookingResult};
use crate::services::negotiation::BookingDetails;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct ConfirmRequest {
    pub message: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<CreateBookingInput>,
) -> Result<(StatusCode, Json<CreateBookingResult>), AppError> {
    let result = bookings::create_booking(&state, user.id(), &body).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

// GET /api/bookings/my-bookings
pub async fn my_bookings(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<Value>, AppError> {
    let list = bookings::list_user_bookings(&state, user.id()).await?;
    Ok(Json(json!({"bookings": list})))
}

// GET /api/bookings/:bookingId
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(booking_id): Path<String>,
) -> Result<Json<BookingDetails>, AppError> {
    Ok(Json(bookings::get_user_booking(&state, user.id(), &booking_id).await?))
}

// GET /api/bookings/:bookingId/quotes
pub async fn quotes(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(booking_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let quotes = bookings::list_quotes(&state, user.id(), &booking_id).await?;
    Ok(Json(json!({"quotes": quotes})))
}

// POST /api/bookings/:bookingId/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(booking_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let booking = bookings::cancel_booking(&state, user.id(), &booking_id).await?;
    Ok(Json(json!({"message": "Booking cancelled", "booking": booking})))
}

// POST /api/bookings/requests/:requestId/confirm
pub async fn confirm_quote(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(request_id): Path<String>,
    body: Option<Json<ConfirmRequest>>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body.unwrap_or_default();
    let (booking, request) =
        bookings::confirm_quote(&state, user.id(), &request_id, body.message.as_deref()).await?;
    Ok(Json(json!({"message": "Booking confirmed", "booking": booking, "bookingRequest": request})))
}

// POST /api/bookings/requests/:requestId/reject
pub async fn reject_quote(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(request_id): Path<String>,
    body: Option<Json<RejectRequest>>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body.unwrap_or_default();
    bookings::reject_quote(&state, user.id(), &request_id, body.reason.as_deref()).await?;
    Ok(Json(json!({"message": "Quote rejected"})))
}
