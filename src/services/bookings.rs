use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries::RequestWithBusiness;
use crate::errors::AppError;
use crate::models::{Booking, BookingRequest, BookingRequestStatus, TimePreference};
use crate::services::negotiation::{self, BookingDetails, NewBooking};
use crate::services::templates;
use crate::services::validation::{optional, required};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingInput {
    pub service_type: Option<String>,
    pub zip_code: Option<String>,
    pub time_preference: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingResult {
    pub booking: Booking,
    pub requests_sent: usize,
}

impl CreateBookingInput {
    fn validate(&self) -> Result<NewBooking, AppError> {
        let service_type = required(self.service_type.as_deref(), "serviceType")?;
        let zip_code = required(self.zip_code.as_deref(), "zipCode")?;
        let raw_pref = required(self.time_preference.as_deref(), "timePreference")?;
        let time_preference = TimePreference::parse(&raw_pref).ok_or_else(|| {
            AppError::validation("timePreference must be one of asap, between, after")
        })?;
        Ok(NewBooking {
            service_type,
            zip_code,
            time_preference,
        })
    }
}

pub async fn create_booking(
    state: &Arc<AppState>,
    user_id: &str,
    input: &CreateBookingInput,
) -> Result<CreateBookingResult, AppError> {
    let new_booking = input.validate()?;
    let created = {
        let mut db = state.conn()?;
        negotiation::create_booking(&mut db, user_id, &new_booking, Utc::now().naive_utc())?
    };

    if created.requests.is_empty() {
        tracing::warn!(booking_id = %created.booking.id, "no businesses registered, booking has no recipients");
    }

    for (request, business) in &created.requests {
        state.notifier.enqueue(templates::booking_request_email(
            business,
            &created.booking,
            &created.customer.full_name,
            &request.id,
            &state.config.public_url,
        ));
    }

    tracing::info!(
        booking_id = %created.booking.id,
        user_id,
        service_type = %created.booking.service_type,
        requests_sent = created.requests.len(),
        "booking created"
    );

    Ok(CreateBookingResult {
        requests_sent: created.requests.len(),
        booking: created.booking,
    })
}

pub async fn accept_request(
    state: &Arc<AppState>,
    request_id: &str,
    price: Option<f64>,
    notes: Option<&str>,
) -> Result<BookingRequest, AppError> {
    let price = match price {
        Some(p) if p.is_finite() && p > 0.0 => p,
        Some(_) => return Err(AppError::validation("price must be a positive number")),
        None => return Err(AppError::validation("price is required")),
    };
    let notes = optional(notes);

    let ctx = {
        let mut db = state.conn()?;
        negotiation::accept_request(&mut db, request_id, price, notes.as_deref(), Utc::now().naive_utc())?
    };

    state.notifier.enqueue(templates::quote_received_email(
        &ctx.customer,
        &ctx.booking,
        &ctx.business,
        &ctx.request,
        &state.config.frontend_url,
    ));
    tracing::info!(request_id, booking_id = %ctx.booking.id, price, "quote sent");
    Ok(ctx.request)
}

pub async fn decline_request(state: &Arc<AppState>, request_id: &str) -> Result<BookingRequest, AppError> {
    let outcome = {
        let mut db = state.conn()?;
        negotiation::decline_request(&mut db, request_id, Utc::now().naive_utc())?
    };

    let ctx = &outcome.context;
    if outcome.booking_cancelled {
        state
            .notifier
            .enqueue(templates::no_business_available_email(&ctx.customer, &ctx.booking));
    }
    tracing::info!(request_id, booking_id = %ctx.booking.id, "request declined");
    Ok(outcome.context.request)
}

pub async fn confirm_quote(
    state: &Arc<AppState>,
    user_id: &str,
    request_id: &str,
    message: Option<&str>,
) -> Result<(Booking, BookingRequest), AppError> {
    let message = optional(message);
    let outcome = {
        let mut db = state.conn()?;
        negotiation::confirm_quote(&mut db, user_id, request_id, message.as_deref(), Utc::now().naive_utc())?
    };

    let ctx = &outcome.context;
    state.notifier.enqueue(templates::booking_confirmed_customer_email(
        &ctx.customer,
        &ctx.booking,
        &ctx.business,
        &ctx.request,
    ));
    state.notifier.enqueue(templates::booking_confirmed_business_email(
        &ctx.business,
        &ctx.booking,
        &ctx.customer,
        &ctx.request,
        message.as_deref(),
    ));
    for other in &outcome.not_selected {
        state.notifier.enqueue(templates::quote_not_selected_email(
            &other.business,
            &ctx.booking,
            &other.request.id,
        ));
    }
    Ok((outcome.context.booking, outcome.context.request))
}

pub async fn reject_quote(
    state: &Arc<AppState>,
    user_id: &str,
    request_id: &str,
    reason: Option<&str>,
) -> Result<(), AppError> {
    let reason = optional(reason);
    let outcome = {
        let mut db = state.conn()?;
        negotiation::reject_quote(&mut db, user_id, request_id, reason.as_deref(), Utc::now().naive_utc())?
    };

    let ctx = &outcome.context;
    state.notifier.enqueue(templates::quote_rejected_email(
        &ctx.business,
        &ctx.booking,
        &ctx.request,
        reason.as_deref(),
    ));
    if outcome.booking_cancelled {
        state
            .notifier
            .enqueue(templates::no_business_available_email(&ctx.customer, &ctx.booking));
    }
    tracing::info!(request_id, booking_id = %ctx.booking.id, "quote rejected");
    Ok(())
}

pub async fn cancel_booking(
    state: &Arc<AppState>,
    user_id: &str,
    booking_id: &str,
) -> Result<Booking, AppError> {
    let outcome = {
        let mut db = state.conn()?;
        negotiation::cancel_booking(&mut db, user_id, booking_id, Utc::now().naive_utc())?
    };

    let quoted = outcome
        .withdrawn
        .iter()
        .filter(|w| w.request.status == BookingRequestStatus::Accepted);
    for withdrawn in quoted {
        state.notifier.enqueue(templates::booking_cancelled_business_email(
            &withdrawn.business,
            &outcome.booking,
            &withdrawn.request.id,
        ));
    }
    tracing::info!(booking_id, withdrawn = outcome.withdrawn.len(), "booking cancelled by customer");
    Ok(outcome.booking)
}

pub async fn list_user_bookings(state: &Arc<AppState>, user_id: &str) -> Result<Vec<BookingDetails>, AppError> {
    let db = state.conn()?;
    negotiation::bookings_for_user(&db, user_id)
}

pub async fn get_user_booking(
    state: &Arc<AppState>,
    user_id: &str,
    booking_id: &str,
) -> Result<BookingDetails, AppError> {
    let db = state.conn()?;
    negotiation::booking_for_user(&db, user_id, booking_id)
}

pub async fn list_quotes(
    state: &Arc<AppState>,
    user_id: &str,
    booking_id: &str,
) -> Result<Vec<RequestWithBusiness>, AppError> {
    let db = state.conn()?;
    negotiation::quotes_for_booking(&db, user_id, booking_id)
}

pub fn respond_link_target(state: &AppState, request_id: &str, action: &str) -> String {
    let base = state.config.frontend_url.trim_end_matches('/');
    let checked = match state.conn() {
        Ok(db) => negotiation::check_respondable(&db, request_id),
        Err(_) => Err("unavailable"),
    };
    match checked {
        Ok(()) => format!("{base}/business/respond/{request_id}?action={action}"),
        Err(reason) => {
            tracing::info!(request_id, action, reason, "stale booking request link");
            format!("{base}/business/error?reason={reason}")
        }
    }
}
