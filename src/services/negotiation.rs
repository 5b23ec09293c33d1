//! Booking lifecycle state changes. Each operation runs in one IMMEDIATE
//! transaction and uses compare-and-set updates, so two racing calls on
//! the same booking can never both win.

use chrono::NaiveDateTime;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::db::queries::{self, RequestWithBusiness};
use crate::errors::AppError;
use crate::models::{
    Booking, BookingRequest, BookingRequestStatus, BookingStatus, Business, TimePreference, User,
};

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub service_type: String,
    pub zip_code: String,
    pub time_preference: TimePreference,
}

#[derive(Debug)]
pub struct CreatedBooking {
    pub booking: Booking,
    pub customer: User,
    pub requests: Vec<(BookingRequest, Business)>,
}

#[derive(Debug)]
pub struct RequestContext {
    pub request: BookingRequest,
    pub booking: Booking,
    pub business: Business,
    pub customer: User,
}

#[derive(Debug)]
pub struct DeclineOutcome {
    pub context: RequestContext,
    pub booking_cancelled: bool,
}

#[derive(Debug)]
pub struct ConfirmOutcome {
    pub context: RequestContext,
    pub not_selected: Vec<RequestWithBusiness>,
}

#[derive(Debug)]
pub struct CancelOutcome {
    pub booking: Booking,
    pub withdrawn: Vec<RequestWithBusiness>,
}

fn begin(conn: &mut Connection) -> Result<Transaction<'_>, AppError> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

fn load_user(conn: &Connection, id: &str) -> Result<User, AppError> {
    queries::get_user(conn, id)?.ok_or_else(|| AppError::not_found("user"))
}

fn load_booking(conn: &Connection, id: &str) -> Result<Booking, AppError> {
    queries::get_booking(conn, id)?.ok_or_else(|| AppError::not_found("booking"))
}

fn load_request(conn: &Connection, id: &str) -> Result<BookingRequest, AppError> {
    queries::get_booking_request(conn, id)?.ok_or_else(|| AppError::not_found("booking request"))
}

fn load_context(conn: &Connection, request_id: &str) -> Result<RequestContext, AppError> {
    let request = load_request(conn, request_id)?;
    let booking = load_booking(conn, &request.booking_id)?;
    let business = queries::get_business(conn, &request.business_id)?
        .ok_or_else(|| AppError::not_found("business"))?;
    let customer = load_user(conn, &booking.user_id)?;
    Ok(RequestContext {
        request,
        booking,
        business,
        customer,
    })
}

/// Loads the request and checks it belongs to one of `user_id`'s bookings.
/// Someone else's request is reported as missing.
fn load_owned_context(
    conn: &Connection,
    user_id: &str,
    request_id: &str,
) -> Result<RequestContext, AppError> {
    let context = load_context(conn, request_id)?;
    if context.booking.user_id != user_id {
        return Err(AppError::not_found("booking request"));
    }
    Ok(context)
}

fn load_owned_booking(conn: &Connection, user_id: &str, booking_id: &str) -> Result<Booking, AppError> {
    let booking = load_booking(conn, booking_id)?;
    if booking.user_id != user_id {
        return Err(AppError::not_found("booking"));
    }
    Ok(booking)
}

fn ensure_open(booking: &Booking) -> Result<(), AppError> {
    if !booking.status.is_open() || booking.selected_request_id.is_some() {
        return Err(AppError::conflict(format!(
            "booking is {} and no longer accepting changes",
            booking.status.as_str()
        )));
    }
    Ok(())
}

fn ensure_transition(
    request: &BookingRequest,
    next: BookingRequestStatus,
) -> Result<(), AppError> {
    if !request.status.can_transition_to(next) {
        return Err(AppError::conflict(format!(
            "booking request is {} and cannot become {}",
            request.status.as_str(),
            next.as_str()
        )));
    }
    Ok(())
}

fn transition(
    conn: &Connection,
    request: &BookingRequest,
    next: BookingRequestStatus,
    user_response: Option<&str>,
    now: &NaiveDateTime,
) -> Result<(), AppError> {
    ensure_transition(request, next)?;
    if !queries::transition_request(conn, &request.id, request.status, next, user_response, now)? {
        return Err(AppError::conflict("booking request was changed concurrently"));
    }
    Ok(())
}

fn cancel_if_exhausted(conn: &Connection, booking_id: &str, now: &NaiveDateTime) -> Result<bool, AppError> {
    let requests = queries::get_requests_for_booking(conn, booking_id)?;
    if requests.is_empty() || requests.iter().any(|r| r.status.is_live()) {
        return Ok(false);
    }
    let cancelled = queries::transition_booking(
        conn,
        booking_id,
        &[BookingStatus::Pending, BookingStatus::Accepted],
        BookingStatus::Cancelled,
        now,
    )?;
    if cancelled {
        tracing::info!(booking_id, "every business declined, booking cancelled");
    }
    Ok(cancelled)
}

pub fn create_booking(
    conn: &mut Connection,
    user_id: &str,
    input: &NewBooking,
    now: NaiveDateTime,
) -> Result<CreatedBooking, AppError> {
    let tx = begin(conn)?;
    let customer = load_user(&tx, user_id)?;

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        service_type: input.service_type.clone(),
        date_time: input.time_preference.resolve(now),
        zip_code: input.zip_code.clone(),
        status: BookingStatus::Pending,
        selected_request_id: None,
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(&tx, &booking)?;

    // TODO: narrow to businesses serving booking.zip_code once coverage areas are modelled.
    let businesses = queries::get_all_businesses(&tx)?;

    let mut requests = Vec::with_capacity(businesses.len());
    for business in businesses {
        let request = BookingRequest {
            id: uuid::Uuid::new_v4().to_string(),
            booking_id: booking.id.clone(),
            business_id: business.id.clone(),
            status: BookingRequestStatus::Pending,
            price: None,
            notes: None,
            user_response: None,
            confirmed_at: None,
            created_at: now,
            updated_at: now,
        };
        queries::insert_booking_request(&tx, &request)?;
        requests.push((request, business));
    }

    tx.commit()?;
    Ok(CreatedBooking {
        booking,
        customer,
        requests,
    })
}

pub fn accept_request(
    conn: &mut Connection,
    request_id: &str,
    price: f64,
    notes: Option<&str>,
    now: NaiveDateTime,
) -> Result<RequestContext, AppError> {
    let tx = begin(conn)?;
    let context = load_context(&tx, request_id)?;
    ensure_transition(&context.request, BookingRequestStatus::Accepted)?;
    ensure_open(&context.booking)?;

    if !queries::record_quote(&tx, request_id, price, notes, &now)? {
        return Err(AppError::conflict("booking request was changed concurrently"));
    }

    let context = load_context(&tx, request_id)?;
    tx.commit()?;
    Ok(context)
}

pub fn decline_request(
    conn: &mut Connection,
    request_id: &str,
    now: NaiveDateTime,
) -> Result<DeclineOutcome, AppError> {
    let tx = begin(conn)?;
    let context = load_context(&tx, request_id)?;
    transition(&tx, &context.request, BookingRequestStatus::Declined, None, &now)?;

    let booking_cancelled = cancel_if_exhausted(&tx, &context.booking.id, &now)?;

    let context = load_context(&tx, request_id)?;
    tx.commit()?;
    Ok(DeclineOutcome {
        context,
        booking_cancelled,
    })
}

pub fn confirm_quote(
    conn: &mut Connection,
    user_id: &str,
    request_id: &str,
    message: Option<&str>,
    now: NaiveDateTime,
) -> Result<ConfirmOutcome, AppError> {
    let tx = begin(conn)?;
    let context = load_owned_context(&tx, user_id, request_id)?;
    ensure_transition(&context.request, BookingRequestStatus::Confirmed)?;
    ensure_open(&context.booking)?;

    let not_selected: Vec<RequestWithBusiness> = queries::get_requests_with_business(
        &tx,
        &context.booking.id,
        Some(BookingRequestStatus::Accepted),
    )?
    .into_iter()
    .filter(|r| r.request.id != request_id)
    .collect();

    transition(&tx, &context.request, BookingRequestStatus::Confirmed, message, &now)?;
    if !queries::confirm_booking(&tx, &context.booking.id, request_id, &now)? {
        return Err(AppError::conflict("booking was confirmed concurrently"));
    }
    let declined = queries::decline_unselected(&tx, &context.booking.id, request_id, &now)?;

    let context = load_context(&tx, request_id)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %context.booking.id,
        request_id,
        business_id = %context.business.id,
        siblings_declined = declined,
        "quote confirmed"
    );
    Ok(ConfirmOutcome {
        context,
        not_selected,
    })
}

pub fn reject_quote(
    conn: &mut Connection,
    user_id: &str,
    request_id: &str,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> Result<DeclineOutcome, AppError> {
    let tx = begin(conn)?;
    let context = load_owned_context(&tx, user_id, request_id)?;
    ensure_open(&context.booking)?;
    transition(&tx, &context.request, BookingRequestStatus::Rejected, reason, &now)?;

    let booking_cancelled = cancel_if_exhausted(&tx, &context.booking.id, &now)?;

    let context = load_context(&tx, request_id)?;
    tx.commit()?;
    Ok(DeclineOutcome {
        context,
        booking_cancelled,
    })
}

pub fn cancel_booking(
    conn: &mut Connection,
    user_id: &str,
    booking_id: &str,
    now: NaiveDateTime,
) -> Result<CancelOutcome, AppError> {
    let tx = begin(conn)?;
    let booking = load_owned_booking(&tx, user_id, booking_id)?;
    ensure_open(&booking)?;

    let withdrawn: Vec<RequestWithBusiness> = queries::get_requests_with_business(&tx, booking_id, None)?
        .into_iter()
        .filter(|r| r.request.status.is_live())
        .collect();

    queries::decline_open_requests(&tx, booking_id, &now)?;
    if !queries::transition_booking(
        &tx,
        booking_id,
        &[BookingStatus::Pending, BookingStatus::Accepted],
        BookingStatus::Cancelled,
        &now,
    )? {
        return Err(AppError::conflict("booking was changed concurrently"));
    }

    let booking = load_booking(&tx, booking_id)?;
    tx.commit()?;
    Ok(CancelOutcome { booking, withdrawn })
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub requests: Vec<RequestWithBusiness>,
}

pub fn bookings_for_user(conn: &Connection, user_id: &str) -> Result<Vec<BookingDetails>, AppError> {
    let bookings = queries::get_bookings_for_user(conn, user_id)?;
    let mut details = Vec::with_capacity(bookings.len());
    for booking in bookings {
        let requests = queries::get_requests_with_business(conn, &booking.id, None)?;
        details.push(BookingDetails { booking, requests });
    }
    Ok(details)
}

pub fn booking_for_user(
    conn: &Connection,
    user_id: &str,
    booking_id: &str,
) -> Result<BookingDetails, AppError> {
    let booking = load_owned_booking(conn, user_id, booking_id)?;
    let requests = queries::get_requests_with_business(conn, booking_id, None)?;
    Ok(BookingDetails { booking, requests })
}

pub fn quotes_for_booking(
    conn: &Connection,
    user_id: &str,
    booking_id: &str,
) -> Result<Vec<RequestWithBusiness>, AppError> {
    load_owned_booking(conn, user_id, booking_id)?;
    Ok(queries::get_requests_with_business(
        conn,
        booking_id,
        Some(BookingRequestStatus::Accepted),
    )?)
}

pub fn check_respondable(conn: &Connection, request_id: &str) -> Result<(), &'static str> {
    let request = match queries::get_booking_request(conn, request_id) {
        Ok(Some(r)) => r,
        Ok(None) => return Err("not_found"),
        Err(e) => {
            tracing::error!(error = %e, request_id, "failed to load booking request for link");
            return Err("unavailable");
        }
    };
    if request.status != BookingRequestStatus::Pending {
        return Err("already_responded");
    }
    match queries::get_booking(conn, &request.booking_id) {
        Ok(Some(b)) if b.status.is_open() && b.selected_request_id.is_none() => Ok(()),
        Ok(_) => Err("booking_closed"),
        Err(e) => {
            tracing::error!(error = %e, request_id, "failed to load booking for link");
            Err("unavailable")
        }
    }
}
