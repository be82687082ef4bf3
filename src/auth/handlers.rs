use axum::{
    body::Bytes,
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{Authorization, LoginResponse, LogoutResponse, RefreshResponse},
        extractors::AuthSession,
        jwt::JwtKeys,
        password::{check_password, PasswordCheck},
    },
    error::ApiError,
    state::AppState,
    users::validation::{parse_body, validate_login},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
}

#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<LoginResponse>, ApiError> {
    let creds = validate_login(&parse_body(&body)).map_err(|errors| {
        warn!(?errors, "invalid login payload");
        ApiError::InvalidLogin(errors)
    })?;

    let user = match state.users.find_active_by_email(&creds.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %creds.email, "login unknown email");
            return Err(ApiError::Unauthorized);
        }
    };

    match check_password(&creds.password, &user.password_hash) {
        PasswordCheck::Match => {}
        PasswordCheck::Mismatch => {
            warn!(user_id = user.id, "login invalid password");
            return Err(ApiError::Unauthorized);
        }
        PasswordCheck::Unreadable(reason) => {
            warn!(user_id = user.id, %reason, "stored password is not a valid hash");
            return Err(ApiError::Unauthorized);
        }
    }

    let issued = JwtKeys::from_ref(&state).sign(user.id)?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse {
        status: "success",
        user,
        authorization: Authorization::bearer(issued.token),
    }))
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>, session: AuthSession) -> Json<LogoutResponse> {
    match state.revocations.revoke(session.jti, session.expires_at).await {
        Ok(()) => {
            info!(user_id = session.user_id, jti = %session.jti, "user logged out");
            Json(LogoutResponse::done())
        }
        Err(e) => {
            error!(error = %e, user_id = session.user_id, "token revocation failed");
            Json(LogoutResponse::failed(e.to_string()))
        }
    }
}

#[instrument(skip(state))]
pub async fn refresh(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<RefreshResponse>, ApiError> {
    let user = match state.users.find_active(session.user_id).await? {
        Some(u) => u,
        None => {
            warn!(user_id = session.user_id, "refresh for missing or deleted user");
            return Err(ApiError::Unauthorized);
        }
    };

    let issued = JwtKeys::from_ref(&state).sign(user.id)?;
    state
        .revocations
        .revoke(session.jti, session.expires_at)
        .await?;

    info!(user_id = user.id, old_jti = %session.jti, new_jti = %issued.claims.jti, "token refreshed");
    Ok(Json(RefreshResponse {
        status: true,
        message: "Refresh token successfully",
        user,
        authorization: Authorization::bearer(issued.token),
    }))
}
