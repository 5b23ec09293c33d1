use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Redirect;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::services::bookings;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct QuoteRequest {
    pub price: Option<f64>,
    pub notes: Option<String>,
}

// POST /api/business/booking-requests/:requestId/accept
pub async fn accept_request(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(request_id): Path<String>,
    Json(body): Json<QuoteRequest>,
) -> Result<Json<Value>, AppError> {
    let request = bookings::accept_request(&state, &request_id, body.price, body.notes.as_deref()).await?;
    Ok(Json(json!({"message": "Quote sent", "bookingRequest": request})))
}

// POST /api/business/booking-requests/:requestId/decline
pub async fn decline_request(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(request_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let request = bookings::decline_request(&state, &request_id).await?;
    Ok(Json(json!({"message": "Booking request declined", "bookingRequest": request})))
}

// GET /api/business/accept/:requestId
pub async fn accept_link(State(state): State<Arc<AppState>>, Path(request_id): Path<String>) -> Redirect {
    Redirect::to(&bookings::respond_link_target(&state, &request_id, "accept"))
}

// GET /api/business/decline/:requestId
pub async fn decline_link(State(state): State<Arc<AppState>>, Path(request_id): Path<String>) -> Redirect {
    Redirect::to(&bookings::respond_link_target(&state, &request_id, "decline"))
}
