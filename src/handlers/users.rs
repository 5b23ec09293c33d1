use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::user::UserProfile;
use crate::services::users::{self, ProfileUpdate};
use crate::state::AppState;

// GET /api/users/me
pub async fn me(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<UserProfile>, AppError> {
    let db = state.conn()?;
    Ok(Json(users::profile(&db, user.id())?))
}

// PUT /api/users/me
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, AppError> {
    let db = state.conn()?;
    Ok(Json(users::update_profile(&db, user.id(), &body)?))
}
