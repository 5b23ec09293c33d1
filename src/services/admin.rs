use chrono::{NaiveDateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, BookingWithCustomer, DashboardStats, RequestOverview};
use crate::errors::{is_unique_violation, AppError};
use crate::models::{Booking, BookingRequestStatus, BookingStatus, Business, User};
use crate::services::negotiation::BookingDetails;
use crate::services::validation::{normalize_email, optional, required};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;
pub const MAX_PAGE: i64 = 1_000_000;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
}

impl ListParams {
    pub fn window(&self) -> (i64, i64) {
        let page = self
            .page
            .filter(|p| *p >= 1)
            .unwrap_or(DEFAULT_PAGE)
            .min(MAX_PAGE);
        let limit = self
            .limit
            .filter(|l| *l >= 1)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        (page, limit)
    }

    fn offset(&self) -> i64 {
        let (page, limit) = self.window();
        (page - 1).saturating_mul(limit)
    }

    fn search(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        Self {
            total,
            pages: (total + limit - 1) / limit,
            current_page: page,
            per_page: limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

fn page_of<T>(params: &ListParams, (items, total): (Vec<T>, i64)) -> Page<T> {
    let (page, limit) = params.window();
    Page {
        items,
        pagination: Pagination::new(total, page, limit),
    }
}

fn parse_booking_status(raw: Option<&str>) -> Result<Option<BookingStatus>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => BookingStatus::parse(s)
            .map(Some)
            .ok_or_else(|| AppError::validation(format!("unknown booking status: {s}"))),
    }
}

fn parse_request_status(raw: Option<&str>) -> Result<Option<BookingRequestStatus>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => BookingRequestStatus::parse(s)
            .map(Some)
            .ok_or_else(|| AppError::validation(format!("unknown request status: {s}"))),
    }
}

pub fn stats(conn: &Connection) -> Result<DashboardStats, AppError> {
    Ok(queries::get_dashboard_stats(conn)?)
}

// ── Businesses ──

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub zip_code: Option<String>,
}

fn duplicate_business(err: anyhow::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::conflict("a business with this email already exists")
    } else {
        AppError::Internal(err)
    }
}

pub fn list_businesses(conn: &Connection, params: &ListParams) -> Result<Page<Business>, AppError> {
    let (_, limit) = params.window();
    let result = queries::list_businesses(conn, params.search(), limit, params.offset())?;
    Ok(page_of(params, result))
}

pub fn get_business(conn: &Connection, id: &str) -> Result<Business, AppError> {
    queries::get_business(conn, id)?.ok_or_else(|| AppError::not_found("business"))
}

pub fn create_business(
    conn: &Connection,
    input: &BusinessInput,
    now: NaiveDateTime,
) -> Result<Business, AppError> {
    let business = Business {
        id: uuid::Uuid::new_v4().to_string(),
        name: required(input.name.as_deref(), "name")?,
        email: normalize_email(input.email.as_deref().unwrap_or_default())?,
        contact_person: required(input.contact_person.as_deref(), "contactPerson")?,
        phone: required(input.phone.as_deref(), "phone")?,
        zip_code: required(input.zip_code.as_deref(), "zipCode")?,
        created_at: now,
    };
    queries::insert_business(conn, &business).map_err(duplicate_business)?;
    tracing::info!(business_id = %business.id, email = %business.email, "business created");
    Ok(business)
}

pub fn update_business(conn: &Connection, id: &str, input: &BusinessInput) -> Result<Business, AppError> {
    let mut business = get_business(conn, id)?;
    if let Some(name) = input.name.as_deref() {
        business.name = required(Some(name), "name")?;
    }
    if let Some(email) = input.email.as_deref() {
        business.email = normalize_email(email)?;
    }
    if let Some(contact) = input.contact_person.as_deref() {
        business.contact_person = required(Some(contact), "contactPerson")?;
    }
    if let Some(phone) = input.phone.as_deref() {
        business.phone = required(Some(phone), "phone")?;
    }
    if let Some(zip) = input.zip_code.as_deref() {
        business.zip_code = required(Some(zip), "zipCode")?;
    }
    if !queries::update_business(conn, &business).map_err(duplicate_business)? {
        return Err(AppError::not_found("business"));
    }
    Ok(business)
}

pub fn delete_business(conn: &mut Connection, id: &str) -> Result<(), AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if !queries::delete_business_cascade(&tx, id)? {
        return Err(AppError::not_found("business"));
    }
    tx.commit()?;
    Ok(())
}

// ── Users ──

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub is_admin: Option<bool>,
}

pub fn list_users(conn: &Connection, params: &ListParams) -> Result<Page<User>, AppError> {
    let (_, limit) = params.window();
    let result = queries::list_users(conn, params.search(), limit, params.offset())?;
    Ok(page_of(params, result))
}

pub fn get_user(conn: &Connection, id: &str) -> Result<User, AppError> {
    queries::get_user(conn, id)?.ok_or_else(|| AppError::not_found("user"))
}

pub fn update_user(conn: &Connection, id: &str, input: &UserUpdate) -> Result<User, AppError> {
    let mut user = get_user(conn, id)?;
    if let Some(name) = input.full_name.as_deref() {
        user.full_name = required(Some(name), "fullName")?;
    }
    if input.phone.is_some() {
        user.phone = optional(input.phone.as_deref());
    }
    if let Some(is_admin) = input.is_admin {
        user.is_admin = is_admin;
    }
    if !queries::update_user(conn, &user)? {
        return Err(AppError::not_found("user"));
    }
    tracing::info!(user_id = id, is_admin = user.is_admin, "user updated by admin");
    Ok(user)
}

pub fn delete_user(conn: &mut Connection, id: &str) -> Result<(), AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if !queries::delete_user_cascade(&tx, id)? {
        return Err(AppError::not_found("user"));
    }
    tx.commit()?;
    tracing::info!(user_id = id, "user deleted");
    Ok(())
}

// ── Bookings ──

pub fn list_bookings(conn: &Connection, params: &ListParams) -> Result<Page<BookingWithCustomer>, AppError> {
    let status = parse_booking_status(params.status.as_deref())?;
    let (_, limit) = params.window();
    let result = queries::list_bookings(conn, status, params.search(), limit, params.offset())?;
    Ok(page_of(params, result))
}

pub fn get_booking(conn: &Connection, id: &str) -> Result<BookingDetails, AppError> {
    let booking = queries::get_booking(conn, id)?.ok_or_else(|| AppError::not_found("booking"))?;
    let requests = queries::get_requests_with_business(conn, id, None)?;
    Ok(BookingDetails { booking, requests })
}

pub fn set_booking_status(conn: &mut Connection, id: &str, raw_status: &str) -> Result<Booking, AppError> {
    let target = BookingStatus::parse(raw_status.trim())
        .ok_or_else(|| AppError::validation(format!("unknown booking status: {raw_status}")))?;
    let from: &[BookingStatus] = match target {
        BookingStatus::Completed => &[BookingStatus::Confirmed],
        BookingStatus::Cancelled => &[BookingStatus::Pending, BookingStatus::Accepted, BookingStatus::Confirmed],
        _ => {
            return Err(AppError::validation(
                "status can only be set to COMPLETED or CANCELLED",
            ))
        }
    };

    let now = Utc::now().naive_utc();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = queries::get_booking(&tx, id)?.ok_or_else(|| AppError::not_found("booking"))?;
    if !queries::transition_booking(&tx, id, from, target, &now)? {
        return Err(AppError::conflict(format!(
            "booking is {} and cannot become {}",
            current.status.as_str(),
            target.as_str()
        )));
    }
    if target == BookingStatus::Cancelled {
        queries::decline_open_requests(&tx, id, &now)?;
    }
    let updated = queries::get_booking(&tx, id)?.ok_or_else(|| AppError::not_found("booking"))?;
    tx.commit()?;

    tracing::info!(
        booking_id = id,
        from = current.status.as_str(),
        to = target.as_str(),
        "booking status set by admin"
    );
    Ok(updated)
}

// ── Booking requests ──

pub fn list_booking_requests(
    conn: &Connection,
    params: &ListParams,
) -> Result<Page<RequestOverview>, AppError> {
    let status = parse_request_status(params.status.as_deref())?;
    let (_, limit) = params.window();
    let result = queries::list_booking_requests(conn, status, params.search(), limit, params.offset())?;
    Ok(page_of(params, result))
}
