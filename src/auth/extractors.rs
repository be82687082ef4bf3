use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::{auth::jwt::JwtKeys, error::ApiError, state::AppState};

/// Authenticated request context: the resolved identity plus the id and
/// expiry of the token that proved it.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: i64,
    pub jti: Uuid,
    pub expires_at: OffsetDateTime,
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = bearer_token(header).ok_or_else(|| {
            warn!("invalid auth scheme");
            ApiError::Unauthorized
        })?;

        let claims = JwtKeys::from_ref(state).verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            ApiError::Unauthorized
        })?;

        if state.revocations.is_revoked(claims.jti).await? {
            warn!(user_id = claims.sub, jti = %claims.jti, "revoked token presented");
            return Err(ApiError::Unauthorized);
        }

        let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp as i64)
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(AuthSession {
            user_id: claims.sub,
            jti: claims.jti,
            expires_at,
        })
    }
}
