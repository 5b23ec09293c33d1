use rusqlite::Connection;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::user::UserProfile;
use crate::services::validation::{optional, required};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

pub fn profile(conn: &Connection, user_id: &str) -> Result<UserProfile, AppError> {
    let user = queries::get_user(conn, user_id)?.ok_or_else(|| AppError::not_found("user"))?;
    Ok(UserProfile::from(&user))
}

pub fn update_profile(
    conn: &Connection,
    user_id: &str,
    input: &ProfileUpdate,
) -> Result<UserProfile, AppError> {
    let mut user = queries::get_user(conn, user_id)?.ok_or_else(|| AppError::not_found("user"))?;
    if let Some(name) = input.full_name.as_deref() {
        user.full_name = required(Some(name), "fullName")?;
    }
    if input.phone.is_some() {
        user.phone = optional(input.phone.as_deref());
    }
    queries::update_user(conn, &user)?;
    tracing::info!(user_id, "profile updated");
    Ok(UserProfile::from(&user))
}

pub fn is_admin(conn: &Connection, user_id: &str) -> Result<bool, AppError> {
    let user = queries::get_user(conn, user_id)?.ok_or(AppError::Unauthorized)?;
    Ok(user.is_admin)
}
