use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AdminUser;
use crate::db::queries::{BookingWithCustomer, DashboardStats, RequestOverview};
use crate::errors::AppError;
use crate::models::{Booking, Business, User};
use crate::services::admin::{self, BusinessInput, ListParams, Page, UserUpdate};
use crate::services::negotiation::BookingDetails;
use crate::state::AppState;

// GET /api/admin/stats
pub async fn stats(State(state): State<Arc<AppState>>, _admin: AdminUser) -> Result<Json<DashboardStats>, AppError> {
    let db = state.conn()?;
    Ok(Json(admin::stats(&db)?))
}

// GET /api/admin/businesses
pub async fn list_businesses(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Business>>, AppError> {
    let db = state.conn()?;
    Ok(Json(admin::list_businesses(&db, &params)?))
}

// POST /api/admin/businesses
pub async fn create_business(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(body): Json<BusinessInput>,
) -> Result<(StatusCode, Json<Business>), AppError> {
    let db = state.conn()?;
    let business = admin::create_business(&db, &body, Utc::now().naive_utc())?;
    Ok((StatusCode::CREATED, Json(business)))
}

// GET /api/admin/businesses/:id
pub async fn get_business(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Business>, AppError> {
    let db = state.conn()?;
    Ok(Json(admin::get_business(&db, &id)?))
}

// PUT /api/admin/businesses/:id
pub async fn update_business(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(body): Json<BusinessInput>,
) -> Result<Json<Business>, AppError> {
    let db = state.conn()?;
    Ok(Json(admin::update_business(&db, &id, &body)?))
}

// DELETE /api/admin/businesses/:id
pub async fn delete_business(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let mut db = state.conn()?;
    admin::delete_business(&mut db, &id)?;
    Ok(Json(json!({"message": "Business deleted"})))
}

// GET /api/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<User>>, AppError> {
    let db = state.conn()?;
    Ok(Json(admin::list_users(&db, &params)?))
}

// GET /api/admin/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let db = state.conn()?;
    Ok(Json(admin::get_user(&db, &id)?))
}

// PUT /api/admin/users/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(body): Json<UserUpdate>,
) -> Result<Json<User>, AppError> {
    let db = state.conn()?;
    Ok(Json(admin::update_user(&db, &id, &body)?))
}

// DELETE /api/admin/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(claims): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if claims.sub == id {
        return Err(AppError::validation("admins cannot delete their own account"));
    }
    let mut db = state.conn()?;
    admin::delete_user(&mut db, &id)?;
    Ok(Json(json!({"message": "User deleted"})))
}

// GET /api/admin/bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<BookingWithCustomer>>, AppError> {
    let db = state.conn()?;
    Ok(Json(admin::list_bookings(&db, &params)?))
}

// GET /api/admin/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<BookingDetails>, AppError> {
    let db = state.conn()?;
    Ok(Json(admin::get_booking(&db, &id)?))
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: Option<String>,
}

// PUT /api/admin/bookings/:id/status
pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Booking>, AppError> {
    let status = body
        .status
        .ok_or_else(|| AppError::validation("status is required"))?;
    let mut db = state.conn()?;
    Ok(Json(admin::set_booking_status(&mut db, &id, &status)?))
}

// GET /api/admin/booking-requests
pub async fn list_booking_requests(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<RequestOverview>>, AppError> {
    let db = state.conn()?;
    Ok(Json(admin::list_booking_requests(&db, &params)?))
}
