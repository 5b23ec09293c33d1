use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use rand::Rng;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::db::queries;
use crate::errors::{is_unique_violation, AppError};
use crate::models::user::UserProfile;
use crate::models::{OtpPurpose, OtpRecord, User};
use crate::services::email::notifier::deliver;
use crate::services::templates;
use crate::services::validation::{normalize_email, optional};
use crate::state::AppState;

pub const OTP_TTL_MINUTES: i64 = 10;
pub const MAX_ATTEMPTS: i64 = 3;

pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:06}")
}

fn codes_match(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone, Default)]
pub struct SignupDetails {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

pub fn issue_otp(
    conn: &Connection,
    email: &str,
    purpose: OtpPurpose,
    code: &str,
    details: &SignupDetails,
    now: NaiveDateTime,
) -> anyhow::Result<OtpRecord> {
    queries::purge_expired_otps(conn, &now)?;
    let superseded = queries::delete_otps_for(conn, email, purpose)?;
    if superseded > 0 {
        tracing::debug!(email, superseded, "replaced outstanding otp");
    }

    let record = OtpRecord {
        id: uuid::Uuid::new_v4().to_string(),
        email: email.to_string(),
        otp: code.to_string(),
        purpose,
        full_name: details.full_name.clone(),
        phone: details.phone.clone(),
        attempts: 0,
        expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
        created_at: now,
    };
    queries::insert_otp(conn, &record)?;
    Ok(record)
}

pub fn consume_otp(
    conn: &Connection,
    email: &str,
    code: &str,
    purpose: OtpPurpose,
    now: NaiveDateTime,
) -> Result<OtpRecord, AppError> {
    let record = queries::find_active_otp(conn, email, purpose, &now)?.ok_or(AppError::InvalidOtp)?;

    if !codes_match(&record.otp, code.trim()) {
        let attempts = queries::increment_otp_attempts(conn, &record.id)?;
        if attempts >= MAX_ATTEMPTS {
            queries::delete_otp(conn, &record.id)?;
            tracing::warn!(email, attempts, "otp attempts exhausted, code invalidated");
        } else {
            tracing::info!(email, attempts, "otp mismatch");
        }
        return Err(AppError::InvalidOtp);
    }

    queries::delete_otps_for(conn, email, purpose)?;
    Ok(record)
}

/// Redeems the code and resolves the account it unlocks: a new verified
/// user for signup, the existing user for login. Attempt counting is
/// committed even when verification fails.
pub fn verify_otp_in(
    conn: &mut Connection,
    email: &str,
    code: &str,
    purpose: OtpPurpose,
    overrides: &SignupDetails,
    now: NaiveDateTime,
) -> Result<User, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let record = match consume_otp(&tx, email, code, purpose, now) {
        Ok(record) => record,
        Err(e) => {
            tx.commit()?;
            return Err(e);
        }
    };

    let user = match purpose {
        OtpPurpose::Signup => {
            if queries::get_user_by_email(&tx, email)?.is_some() {
                return Err(AppError::validation("Email already registered"));
            }
            let full_name = overrides
                .full_name
                .clone()
                .or(record.full_name)
                .ok_or_else(|| AppError::validation("fullName is required"))?;
            let user = User {
                id: uuid::Uuid::new_v4().to_string(),
                full_name,
                email: email.to_string(),
                phone: overrides.phone.clone().or(record.phone),
                verified: true,
                is_admin: false,
                created_at: now,
            };
            queries::insert_user(&tx, &user).map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::validation("Email already registered")
                } else {
                    AppError::Internal(e)
                }
            })?;
            tracing::info!(user_id = %user.id, email, "account created");
            user
        }
        OtpPurpose::Login => queries::get_user_by_email(&tx, email)?
            .ok_or_else(|| AppError::not_found("user"))?,
    };

    tx.commit()?;
    Ok(user)
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

pub async fn request_otp(
    state: &Arc<AppState>,
    raw_email: &str,
    purpose: OtpPurpose,
    details: SignupDetails,
) -> Result<String, AppError> {
    let email = normalize_email(raw_email)?;
    if purpose == OtpPurpose::Signup && details.full_name.is_none() {
        return Err(AppError::validation("fullName is required"));
    }

    let code = generate_code();
    let record = {
        let db = state.conn()?;
        let existing = queries::get_user_by_email(&db, &email)?;
        match (purpose, existing) {
            (OtpPurpose::Signup, Some(_)) => {
                return Err(AppError::validation("Email already registered"));
            }
            (OtpPurpose::Login, None) => return Err(AppError::not_found("user")),
            _ => {}
        }
        issue_otp(&db, &email, purpose, &code, &details, Utc::now().naive_utc())?
    };

    let message = templates::otp_email(&email, &code, purpose);
    if !deliver(state.email.as_ref(), &message).await {
        let db = state.conn()?;
        queries::delete_otp(&db, &record.id)?;
        return Err(AppError::Internal(anyhow::anyhow!("failed to deliver otp to {email}")));
    }

    tracing::info!(email = %email, purpose = purpose.as_str(), "otp issued");
    Ok(email)
}

pub async fn verify_otp(
    state: &Arc<AppState>,
    raw_email: &str,
    code: &str,
    purpose: OtpPurpose,
    overrides: SignupDetails,
) -> Result<Session, AppError> {
    let email = normalize_email(raw_email)?;
    let code = code.trim();
    if code.is_empty() {
        return Err(AppError::validation("otp is required"));
    }
    let overrides = SignupDetails {
        full_name: optional(overrides.full_name.as_deref()),
        phone: optional(overrides.phone.as_deref()),
    };

    let user = {
        let mut db = state.conn()?;
        verify_otp_in(&mut db, &email, code, purpose, &overrides, Utc::now().naive_utc())?
    };

    let token = state.tokens.issue(&user)?;
    tracing::info!(user_id = %user.id, purpose = purpose.as_str(), "otp verified");
    Ok(Session {
        token,
        user: UserProfile::from(&user),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-06-16 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn signup_details() -> SignupDetails {
        SignupDetails {
            full_name: Some("Ada Lovelace".to_string()),
            phone: Some("555-0101".to_string()),
        }
    }

    #[test]
    fn test_codes_are_six_digits() {
        for _ in 0..1_000 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_codes_are_uniform() {
        // 200k draws, ~20k expected per leading digit; 5 sigma is about 670.
        let mut buckets = [0u32; 10];
        let mut low_half = 0u32;
        for _ in 0..200_000 {
            let code = generate_code();
            let n: u32 = code.parse().unwrap();
            buckets[(n / 100_000) as usize] += 1;
            if n < 500_000 {
                low_half += 1;
            }
        }
        for count in buckets {
            assert!((19_300..=20_700).contains(&count), "bucket count {count}");
        }
        assert!((99_000..=101_000).contains(&low_half));
    }

    #[test]
    fn test_signup_creates_verified_user() {
        let mut conn = db::init_db(":memory:").unwrap();
        issue_otp(&conn, "ada@test.com", OtpPurpose::Signup, "123456", &signup_details(), now()).unwrap();

        let user = verify_otp_in(
            &mut conn,
            "ada@test.com",
            "123456",
            OtpPurpose::Signup,
            &SignupDetails::default(),
            now() + Duration::minutes(2),
        )
        .unwrap();
        assert!(user.verified);
        assert!(!user.is_admin);
        assert_eq!(user.full_name, "Ada Lovelace");
        assert_eq!(user.phone.as_deref(), Some("555-0101"));
    }

    #[test]
    fn test_code_cannot_be_used_twice() {
        let mut conn = db::init_db(":memory:").unwrap();
        issue_otp(&conn, "ada@test.com", OtpPurpose::Signup, "123456", &signup_details(), now()).unwrap();
        verify_otp_in(&mut conn, "ada@test.com", "123456", OtpPurpose::Signup, &SignupDetails::default(), now())
            .unwrap();

        let again = verify_otp_in(
            &mut conn,
            "ada@test.com",
            "123456",
            OtpPurpose::Signup,
            &SignupDetails::default(),
            now(),
        );
        assert!(matches!(again, Err(AppError::InvalidOtp)));
    }

    #[test]
    fn test_expired_code_rejected() {
        let conn = db::init_db(":memory:").unwrap();
        issue_otp(&conn, "ada@test.com", OtpPurpose::Login, "654321", &SignupDetails::default(), now()).unwrap();

        let late = now() + Duration::minutes(OTP_TTL_MINUTES) + Duration::seconds(1);
        let result = consume_otp(&conn, "ada@test.com", "654321", OtpPurpose::Login, late);
        assert!(matches!(result, Err(AppError::InvalidOtp)));
    }

    #[test]
    fn test_new_request_supersedes_old_code() {
        let conn = db::init_db(":memory:").unwrap();
        issue_otp(&conn, "ada@test.com", OtpPurpose::Login, "111111", &SignupDetails::default(), now()).unwrap();
        issue_otp(&conn, "ada@test.com", OtpPurpose::Login, "222222", &SignupDetails::default(), now()).unwrap();

        assert!(consume_otp(&conn, "ada@test.com", "111111", OtpPurpose::Login, now()).is_err());
        assert!(consume_otp(&conn, "ada@test.com", "222222", OtpPurpose::Login, now()).is_ok());
    }

    #[test]
    fn test_attempts_exhausted_invalidates_code() {
        let mut conn = db::init_db(":memory:").unwrap();
        issue_otp(&conn, "ada@test.com", OtpPurpose::Signup, "123456", &signup_details(), now()).unwrap();

        for _ in 0..MAX_ATTEMPTS {
            let result = verify_otp_in(
                &mut conn,
                "ada@test.com",
                "000000",
                OtpPurpose::Signup,
                &SignupDetails::default(),
                now(),
            );
            assert!(matches!(result, Err(AppError::InvalidOtp)));
        }

        // The right code no longer works.
        let result = verify_otp_in(
            &mut conn,
            "ada@test.com",
            "123456",
            OtpPurpose::Signup,
            &SignupDetails::default(),
            now(),
        );
        assert!(matches!(result, Err(AppError::InvalidOtp)));
        assert!(queries::get_user_by_email(&conn, "ada@test.com").unwrap().is_none());
    }

    #[test]
    fn test_wrong_guess_below_limit_keeps_code() {
        let conn = db::init_db(":memory:").unwrap();
        issue_otp(&conn, "ada@test.com", OtpPurpose::Login, "123456", &SignupDetails::default(), now()).unwrap();

        assert!(consume_otp(&conn, "ada@test.com", "999999", OtpPurpose::Login, now()).is_err());
        assert!(consume_otp(&conn, "ada@test.com", "123456", OtpPurpose::Login, now()).is_ok());
    }

    #[test]
    fn test_login_for_deleted_user_is_not_found() {
        let mut conn = db::init_db(":memory:").unwrap();
        issue_otp(&conn, "ghost@test.com", OtpPurpose::Login, "123456", &SignupDetails::default(), now()).unwrap();
        let result = verify_otp_in(
            &mut conn,
            "ghost@test.com",
            "123456",
            OtpPurpose::Login,
            &SignupDetails::default(),
            now(),
        );
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
