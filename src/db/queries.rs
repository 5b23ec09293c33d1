use std::collections::BTreeMap;

use anyhow::Context;
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::models::{
    Booking, BookingRequest, BookingRequestStatus, BookingStatus, Business, OtpPurpose, OtpRecord,
    User,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn ts_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TS_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_ts_col(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        NaiveDateTime::parse_from_str(&s, TS_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

pub fn like_pattern(search: Option<&str>) -> Option<String> {
    let term = search.map(str::trim).filter(|s| !s.is_empty())?;
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
}

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> anyhow::Result<Vec<T>> {
    let mut items = vec![];
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

// ── Users ──

const USER_COLUMNS: &str = "id, full_name, email, phone, verified, is_admin, created_at";

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        verified: row.get::<_, i32>(4)? != 0,
        is_admin: row.get::<_, i32>(5)? != 0,
        created_at: ts_col(row, 6)?,
    })
}

pub fn insert_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, full_name, email, phone, verified, is_admin, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.id,
            user.full_name,
            user.email,
            user.phone,
            user.verified as i32,
            user.is_admin as i32,
            format_ts(&user.created_at),
        ],
    )
    .context("failed to insert user")?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

pub fn update_user(conn: &Connection, user: &User) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET full_name = ?1, phone = ?2, is_admin = ?3 WHERE id = ?4",
        params![user.full_name, user.phone, user.is_admin as i32, user.id],
    )?;
    Ok(count > 0)
}

pub fn set_admin_by_email(conn: &Connection, email: &str, is_admin: bool) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET is_admin = ?1 WHERE email = ?2",
        params![is_admin as i32, email],
    )?;
    Ok(count > 0)
}

/// Removes the user and everything hanging off it. Run inside a transaction.
pub fn delete_user_cascade(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    conn.execute(
        "DELETE FROM booking_requests WHERE booking_id IN (SELECT id FROM bookings WHERE user_id = ?1)",
        params![id],
    )?;
    conn.execute("DELETE FROM bookings WHERE user_id = ?1", params![id])?;
    conn.execute(
        "DELETE FROM otps WHERE email = (SELECT email FROM users WHERE id = ?1)",
        params![id],
    )?;
    let count = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn list_users(
    conn: &Connection,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<User>, i64)> {
    let pattern = like_pattern(search);
    let filter = "(?1 IS NULL OR LOWER(full_name) LIKE ?1 ESCAPE '\\'
                   OR LOWER(email) LIKE ?1 ESCAPE '\\'
                   OR LOWER(COALESCE(phone, '')) LIKE ?1 ESCAPE '\\')";

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM users WHERE {filter}"),
        params![pattern],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {filter}
         ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3"
    ))?;
    let rows = stmt.query_map(params![pattern, limit, offset], parse_user_row)?;
    Ok((collect(rows)?, total))
}

// ── Businesses ──

const BUSINESS_COLUMNS: &str = "id, name, email, contact_person, phone, zip_code, created_at";

fn parse_business_row(row: &Row) -> rusqlite::Result<Business> {
    parse_business_at(row, 0)
}

fn parse_business_at(row: &Row, start: usize) -> rusqlite::Result<Business> {
    Ok(Business {
        id: row.get(start)?,
        name: row.get(start + 1)?,
        email: row.get(start + 2)?,
        contact_person: row.get(start + 3)?,
        phone: row.get(start + 4)?,
        zip_code: row.get(start + 5)?,
        created_at: ts_col(row, start + 6)?,
    })
}

pub fn insert_business(conn: &Connection, business: &Business) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO businesses (id, name, email, contact_person, phone, zip_code, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            business.id,
            business.name,
            business.email,
            business.contact_person,
            business.phone,
            business.zip_code,
            format_ts(&business.created_at),
        ],
    )
    .context("failed to insert business")?;
    Ok(())
}

pub fn get_business(conn: &Connection, id: &str) -> anyhow::Result<Option<Business>> {
    let business = conn
        .query_row(
            &format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = ?1"),
            params![id],
            parse_business_row,
        )
        .optional()?;
    Ok(business)
}

pub fn get_all_businesses(conn: &Connection) -> anyhow::Result<Vec<Business>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BUSINESS_COLUMNS} FROM businesses ORDER BY created_at ASC, id"
    ))?;
    let rows = stmt.query_map([], parse_business_row)?;
    collect(rows)
}

pub fn update_business(conn: &Connection, business: &Business) -> anyhow::Result<bool> {
    let count = conn
        .execute(
            "UPDATE businesses SET name = ?1, email = ?2, contact_person = ?3, phone = ?4, zip_code = ?5
             WHERE id = ?6",
            params![
                business.name,
                business.email,
                business.contact_person,
                business.phone,
                business.zip_code,
                business.id,
            ],
        )
        .context("failed to update business")?;
    Ok(count > 0)
}

/// Deletes the business's booking requests, then the business. Run inside a transaction.
pub fn delete_business_cascade(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    conn.execute(
        "UPDATE bookings SET selected_request_id = NULL
         WHERE selected_request_id IN (SELECT id FROM booking_requests WHERE business_id = ?1)",
        params![id],
    )?;
    let removed = conn.execute("DELETE FROM booking_requests WHERE business_id = ?1", params![id])?;
    let count = conn.execute("DELETE FROM businesses WHERE id = ?1", params![id])?;
    if count > 0 {
        tracing::info!(business_id = id, requests_removed = removed, "deleted business");
    }
    Ok(count > 0)
}

pub fn list_businesses(
    conn: &Connection,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<Business>, i64)> {
    let pattern = like_pattern(search);
    let filter = "(?1 IS NULL OR LOWER(name) LIKE ?1 ESCAPE '\\'
                   OR LOWER(email) LIKE ?1 ESCAPE '\\'
                   OR LOWER(zip_code) LIKE ?1 ESCAPE '\\'
                   OR LOWER(contact_person) LIKE ?1 ESCAPE '\\')";

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM businesses WHERE {filter}"),
        params![pattern],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {BUSINESS_COLUMNS} FROM businesses WHERE {filter}
         ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3"
    ))?;
    let rows = stmt.query_map(params![pattern, limit, offset], parse_business_row)?;
    Ok((collect(rows)?, total))
}

// ── Bookings ──

const BOOKING_COLUMNS: &str =
    "b.id, b.user_id, b.service_type, b.date_time, b.zip_code, b.status, b.selected_request_id, b.created_at, b.updated_at";

fn parse_booking_row(row: &Row) -> rusqlite::Result<Booking> {
    let status_str: String = row.get(5)?;
    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| conversion_error(5, format!("unknown booking status: {status_str}")))?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        service_type: row.get(2)?,
        date_time: ts_col(row, 3)?,
        zip_code: row.get(4)?,
        status,
        selected_request_id: row.get(6)?,
        created_at: ts_col(row, 7)?,
        updated_at: ts_col(row, 8)?,
    })
}

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, service_type, date_time, zip_code, status, selected_request_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            booking.id,
            booking.user_id,
            booking.service_type,
            format_ts(&booking.date_time),
            booking.zip_code,
            booking.status.as_str(),
            booking.selected_request_id,
            format_ts(&booking.created_at),
            format_ts(&booking.updated_at),
        ],
    )
    .context("failed to insert booking")?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1"),
            params![id],
            parse_booking_row,
        )
        .optional()?;
    Ok(booking)
}

pub fn get_bookings_for_user(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.user_id = ?1 ORDER BY b.created_at DESC, b.id"
    ))?;
    let rows = stmt.query_map(params![user_id], parse_booking_row)?;
    collect(rows)
}

/// Compare-and-set on the booking status: only rows currently in one of
/// `from` are moved to `to`. Returns whether the row changed.
pub fn transition_booking(
    conn: &Connection,
    id: &str,
    from: &[BookingStatus],
    to: BookingStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let mut changed = 0;
    for status in from {
        changed += conn.execute(
            "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
            params![to.as_str(), format_ts(now), id, status.as_str()],
        )?;
        if changed > 0 {
            break;
        }
    }
    Ok(changed > 0)
}

pub fn confirm_booking(
    conn: &Connection,
    id: &str,
    request_id: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = 'CONFIRMED', selected_request_id = ?1, updated_at = ?2
         WHERE id = ?3 AND status IN ('PENDING', 'ACCEPTED') AND selected_request_id IS NULL",
        params![request_id, format_ts(now), id],
    )?;
    Ok(count > 0)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingWithCustomer {
    #[serde(flatten)]
    pub booking: Booking,
    pub customer_name: String,
    pub customer_email: String,
}

pub fn list_bookings(
    conn: &Connection,
    status: Option<BookingStatus>,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<BookingWithCustomer>, i64)> {
    let pattern = like_pattern(search);
    let status_str = status.map(|s| s.as_str());
    let filter = "(?1 IS NULL OR b.status = ?1)
                  AND (?2 IS NULL OR LOWER(b.service_type) LIKE ?2 ESCAPE '\\'
                       OR LOWER(b.zip_code) LIKE ?2 ESCAPE '\\'
                       OR LOWER(u.email) LIKE ?2 ESCAPE '\\'
                       OR LOWER(u.full_name) LIKE ?2 ESCAPE '\\')";

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM bookings b JOIN users u ON u.id = b.user_id WHERE {filter}"),
        params![status_str, pattern],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS}, u.full_name, u.email
         FROM bookings b JOIN users u ON u.id = b.user_id
         WHERE {filter}
         ORDER BY b.created_at DESC, b.id LIMIT ?3 OFFSET ?4"
    ))?;
    let rows = stmt.query_map(params![status_str, pattern, limit, offset], |row| {
        Ok(BookingWithCustomer {
            booking: parse_booking_row(row)?,
            customer_name: row.get(9)?,
            customer_email: row.get(10)?,
        })
    })?;
    Ok((collect(rows)?, total))
}

// ── Booking Requests ──

const REQUEST_COLUMNS: &str =
    "r.id, r.booking_id, r.business_id, r.status, r.price, r.notes, r.user_response, r.confirmed_at, r.created_at, r.updated_at";

fn parse_request_row(row: &Row) -> rusqlite::Result<BookingRequest> {
    let status_str: String = row.get(3)?;
    let status = BookingRequestStatus::parse(&status_str)
        .ok_or_else(|| conversion_error(3, format!("unknown request status: {status_str}")))?;

    Ok(BookingRequest {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        business_id: row.get(2)?,
        status,
        price: row.get(4)?,
        notes: row.get(5)?,
        user_response: row.get(6)?,
        confirmed_at: opt_ts_col(row, 7)?,
        created_at: ts_col(row, 8)?,
        updated_at: ts_col(row, 9)?,
    })
}

pub fn insert_booking_request(conn: &Connection, request: &BookingRequest) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO booking_requests (id, booking_id, business_id, status, price, notes, user_response, confirmed_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            request.id,
            request.booking_id,
            request.business_id,
            request.status.as_str(),
            request.price,
            request.notes,
            request.user_response,
            request.confirmed_at.as_ref().map(format_ts),
            format_ts(&request.created_at),
            format_ts(&request.updated_at),
        ],
    )
    .context("failed to insert booking request")?;
    Ok(())
}

pub fn get_booking_request(conn: &Connection, id: &str) -> anyhow::Result<Option<BookingRequest>> {
    let request = conn
        .query_row(
            &format!("SELECT {REQUEST_COLUMNS} FROM booking_requests r WHERE r.id = ?1"),
            params![id],
            parse_request_row,
        )
        .optional()?;
    Ok(request)
}

pub fn get_requests_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Vec<BookingRequest>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REQUEST_COLUMNS} FROM booking_requests r WHERE r.booking_id = ?1 ORDER BY r.created_at ASC, r.id"
    ))?;
    let rows = stmt.query_map(params![booking_id], parse_request_row)?;
    collect(rows)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWithBusiness {
    #[serde(flatten)]
    pub request: BookingRequest,
    pub business: Business,
}

pub fn get_requests_with_business(
    conn: &Connection,
    booking_id: &str,
    status: Option<BookingRequestStatus>,
) -> anyhow::Result<Vec<RequestWithBusiness>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REQUEST_COLUMNS}, {}
         FROM booking_requests r JOIN businesses bz ON bz.id = r.business_id
         WHERE r.booking_id = ?1 AND (?2 IS NULL OR r.status = ?2)
         ORDER BY r.created_at ASC, r.id",
        prefixed_business_columns("bz")
    ))?;
    let rows = stmt.query_map(params![booking_id, status.map(|s| s.as_str())], |row| {
        Ok(RequestWithBusiness {
            request: parse_request_row(row)?,
            business: parse_business_at(row, 10)?,
        })
    })?;
    collect(rows)
}

fn prefixed_business_columns(alias: &str) -> String {
    BUSINESS_COLUMNS
        .split(", ")
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn record_quote(
    conn: &Connection,
    id: &str,
    price: f64,
    notes: Option<&str>,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE booking_requests SET status = 'ACCEPTED', price = ?1, notes = ?2, updated_at = ?3
         WHERE id = ?4 AND status = 'PENDING'",
        params![price, notes, format_ts(now), id],
    )?;
    Ok(count > 0)
}

pub fn transition_request(
    conn: &Connection,
    id: &str,
    from: BookingRequestStatus,
    to: BookingRequestStatus,
    user_response: Option<&str>,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let confirmed_at = (to == BookingRequestStatus::Confirmed).then(|| format_ts(now));
    let count = conn.execute(
        "UPDATE booking_requests
         SET status = ?1,
             user_response = COALESCE(?2, user_response),
             confirmed_at = COALESCE(?3, confirmed_at),
             updated_at = ?4
         WHERE id = ?5 AND status = ?6",
        params![to.as_str(), user_response, confirmed_at, format_ts(now), id, from.as_str()],
    )?;
    Ok(count > 0)
}

pub fn decline_open_requests(
    conn: &Connection,
    booking_id: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE booking_requests SET status = 'DECLINED', updated_at = ?1
         WHERE booking_id = ?2 AND status IN ('PENDING', 'ACCEPTED')",
        params![format_ts(now), booking_id],
    )?;
    Ok(count)
}

pub fn decline_unselected(
    conn: &Connection,
    booking_id: &str,
    selected_id: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE booking_requests SET status = 'DECLINED', updated_at = ?1
         WHERE booking_id = ?2 AND id != ?3 AND status NOT IN ('CONFIRMED', 'DECLINED')",
        params![format_ts(now), booking_id, selected_id],
    )?;
    Ok(count)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOverview {
    #[serde(flatten)]
    pub request: BookingRequest,
    pub service_type: String,
    pub customer_email: String,
    pub business_name: String,
}

pub fn list_booking_requests(
    conn: &Connection,
    status: Option<BookingRequestStatus>,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<RequestOverview>, i64)> {
    let pattern = like_pattern(search);
    let status_str = status.map(|s| s.as_str());
    let from = "booking_requests r
                JOIN bookings b ON b.id = r.booking_id
                JOIN users u ON u.id = b.user_id
                JOIN businesses bz ON bz.id = r.business_id";
    let filter = "(?1 IS NULL OR r.status = ?1)
                  AND (?2 IS NULL OR LOWER(bz.name) LIKE ?2 ESCAPE '\\'
                       OR LOWER(u.email) LIKE ?2 ESCAPE '\\'
                       OR LOWER(b.zip_code) LIKE ?2 ESCAPE '\\')";

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {from} WHERE {filter}"),
        params![status_str, pattern],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {REQUEST_COLUMNS}, b.service_type, u.email, bz.name
         FROM {from} WHERE {filter}
         ORDER BY r.created_at DESC, r.id LIMIT ?3 OFFSET ?4"
    ))?;
    let rows = stmt.query_map(params![status_str, pattern, limit, offset], |row| {
        Ok(RequestOverview {
            request: parse_request_row(row)?,
            service_type: row.get(10)?,
            customer_email: row.get(11)?,
            business_name: row.get(12)?,
        })
    })?;
    Ok((collect(rows)?, total))
}

// ── OTPs ──

const OTP_COLUMNS: &str =
    "id, email, otp, purpose, full_name, phone, attempts, expires_at, created_at";

fn parse_otp_row(row: &Row) -> rusqlite::Result<OtpRecord> {
    let purpose_str: String = row.get(3)?;
    let purpose = OtpPurpose::parse(&purpose_str)
        .ok_or_else(|| conversion_error(3, format!("unknown otp purpose: {purpose_str}")))?;

    Ok(OtpRecord {
        id: row.get(0)?,
        email: row.get(1)?,
        otp: row.get(2)?,
        purpose,
        full_name: row.get(4)?,
        phone: row.get(5)?,
        attempts: row.get(6)?,
        expires_at: ts_col(row, 7)?,
        created_at: ts_col(row, 8)?,
    })
}

pub fn insert_otp(conn: &Connection, record: &OtpRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO otps (id, email, otp, purpose, full_name, phone, attempts, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.id,
            record.email,
            record.otp,
            record.purpose.as_str(),
            record.full_name,
            record.phone,
            record.attempts,
            format_ts(&record.expires_at),
            format_ts(&record.created_at),
        ],
    )
    .context("failed to insert otp")?;
    Ok(())
}

pub fn find_active_otp(
    conn: &Connection,
    email: &str,
    purpose: OtpPurpose,
    now: &NaiveDateTime,
) -> anyhow::Result<Option<OtpRecord>> {
    let record = conn
        .query_row(
            &format!(
                "SELECT {OTP_COLUMNS} FROM otps
                 WHERE email = ?1 AND purpose = ?2 AND expires_at > ?3
                 ORDER BY created_at DESC, rowid DESC LIMIT 1"
            ),
            params![email, purpose.as_str(), format_ts(now)],
            parse_otp_row,
        )
        .optional()?;
    Ok(record)
}

pub fn increment_otp_attempts(conn: &Connection, id: &str) -> anyhow::Result<i64> {
    conn.execute("UPDATE otps SET attempts = attempts + 1 WHERE id = ?1", params![id])?;
    let attempts = conn.query_row("SELECT attempts FROM otps WHERE id = ?1", params![id], |row| {
        row.get(0)
    })?;
    Ok(attempts)
}

pub fn delete_otp(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM otps WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn delete_otps_for(conn: &Connection, email: &str, purpose: OtpPurpose) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM otps WHERE email = ?1 AND purpose = ?2",
        params![email, purpose.as_str()],
    )?;
    Ok(count)
}

pub fn purge_expired_otps(conn: &Connection, now: &NaiveDateTime) -> anyhow::Result<usize> {
    let count = conn.execute("DELETE FROM otps WHERE expires_at <= ?1", params![format_ts(now)])?;
    Ok(count)
}

// ── Dashboard ──

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_businesses: i64,
    pub total_bookings: i64,
    pub total_booking_requests: i64,
    pub bookings_by_status: BTreeMap<String, i64>,
}

pub fn get_dashboard_stats(conn: &Connection) -> anyhow::Result<DashboardStats> {
    let count = |sql: &str| -> anyhow::Result<i64> {
        Ok(conn.query_row(sql, [], |row| row.get(0))?)
    };

    let total_users = count("SELECT COUNT(*) FROM users WHERE is_admin = 0")?;
    let total_businesses = count("SELECT COUNT(*) FROM businesses")?;
    let total_bookings = count("SELECT COUNT(*) FROM bookings")?;
    let total_booking_requests = count("SELECT COUNT(*) FROM booking_requests")?;

    let mut bookings_by_status: BTreeMap<String, i64> = BookingStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();

    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM bookings GROUP BY status")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    for (status, n) in collect(rows)? {
        bookings_by_status.insert(status, n);
    }

    Ok(DashboardStats {
        total_users,
        total_businesses,
        total_bookings,
        total_booking_requests,
        bookings_by_status,
    })
}
