use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::errors::AppError;
use crate::services::tokens::Claims;
use crate::services::users;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

/// Caller whose stored user row has the admin flag. The token claim alone is
/// not trusted, so a revoked admin loses access before the token expires.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.0.sub
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let claims = state.tokens.verify(token)?;
        Ok(AuthUser(claims))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        let is_admin = {
            let db = state.conn()?;
            users::is_admin(&db, &claims.sub)?
        };
        if !is_admin {
            tracing::warn!(user_id = %claims.sub, path = %parts.uri.path(), "non-admin on admin route");
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(claims))
    }
}
