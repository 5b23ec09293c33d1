use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::OtpPurpose;
use crate::services::otp::{self, Session, SignupDetails};
use crate::services::users;
use crate::services::validation::optional;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
}

// POST /api/auth/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignupRequest>,
) -> Result<Json<Value>, AppError> {
    let details = SignupDetails {
        full_name: optional(body.full_name.as_deref()),
        phone: optional(body.phone.as_deref()),
    };
    let email = otp::request_otp(
        &state,
        body.email.as_deref().unwrap_or_default(),
        OtpPurpose::Signup,
        details,
    )
    .await?;
    Ok(Json(json!({"message": format!("OTP sent to {email}")})))
}

// POST /api/auth/verify-signup
pub async fn verify_signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyRequest>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let overrides = SignupDetails {
        full_name: body.full_name,
        phone: body.phone,
    };
    let session = otp::verify_otp(
        &state,
        body.email.as_deref().unwrap_or_default(),
        body.otp.as_deref().unwrap_or_default(),
        OtpPurpose::Signup,
        overrides,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let email = otp::request_otp(
        &state,
        body.email.as_deref().unwrap_or_default(),
        OtpPurpose::Login,
        SignupDetails::default(),
    )
    .await?;
    Ok(Json(json!({"message": format!("OTP sent to {email}")})))
}

// POST /api/auth/verify-login
pub async fn verify_login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<Session>, AppError> {
    let session = otp::verify_otp(
        &state,
        body.email.as_deref().unwrap_or_default(),
        body.otp.as_deref().unwrap_or_default(),
        OtpPurpose::Login,
        SignupDetails::default(),
    )
    .await?;
    Ok(Json(session))
}

// GET /api/auth/check-admin
pub async fn check_admin(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let is_admin = {
        let db = state.conn()?;
        users::is_admin(&db, user.id())?
    };
    Ok(Json(json!({"isAdmin": is_admin})))
}
