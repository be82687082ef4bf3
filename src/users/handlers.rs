use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{extractors::AuthSession, password::hash_password},
    error::ApiError,
    state::AppState,
    users::{
        dto::{MessageResponse, UserCreatedResponse, UserListResponse, UserResponse},
        model::{NewUser, UserChanges},
        repo::StoreError,
        validation::{
            email_taken_errors, parse_body, submitted_email, validate_create, validate_update,
            RuleContext,
        },
    },
};

const NOT_FOUND: &str = "User not found";
const NOT_CREATED: &str = "User not created";
const NOT_UPDATED: &str = "User not updated";

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/user", post(create_user))
        .route(
            "/user/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

/// Non-numeric ids can never match a row, so they are reported as missing.
fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| ApiError::NotFound(NOT_FOUND))
}

fn rules(state: &AppState, email_taken: bool) -> RuleContext {
    RuleContext {
        today: OffsetDateTime::now_utc().date(),
        birth_date_rule: state.config.birth_date_rule,
        email_taken,
    }
}

/// Maps a store failure on write, turning a lost uniqueness race into the usual field error.
fn write_failed(message: &'static str) -> impl FnOnce(StoreError) -> ApiError {
    move |err| match err {
        StoreError::EmailTaken => {
            warn!("email constraint rejected write");
            ApiError::Validation {
                message,
                errors: email_taken_errors(),
            }
        }
        other => other.into(),
    }
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    _session: AuthSession,
) -> Result<Json<UserListResponse>, ApiError> {
    let users = state.users.list_active().await?;
    if users.is_empty() {
        return Err(ApiError::NotFound("There are no users"));
    }
    Ok(Json(UserListResponse {
        state: true,
        message: "Users list",
        users,
    }))
}

#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<UserCreatedResponse>, ApiError> {
    let payload = parse_body(&body);
    let email_taken = match submitted_email(&payload) {
        Some(email) => state.users.email_taken(&email, None).await?,
        None => false,
    };

    let input = validate_create(&payload, rules(&state, email_taken)).map_err(|errors| {
        warn!(?errors, "user not created");
        ApiError::Validation {
            message: NOT_CREATED,
            errors,
        }
    })?;

    let password_hash = hash_password(&input.password)?;
    let user = state
        .users
        .insert(NewUser {
            uid: Uuid::new_v4(),
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            password_hash,
            address: input.address,
            phone: input.phone,
            phone_2: input.phone_2,
            postal_code: input.postal_code,
            birth_date: input.birth_date,
            gender: input.gender,
        })
        .await
        .map_err(write_failed(NOT_CREATED))?;

    info!(user_id = user.id, uid = %user.uid, "user created");
    Ok(Json(UserCreatedResponse {
        state: true,
        message: "User created",
        user,
    }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_id(&id)?;
    let user = state
        .users
        .find_active(id)
        .await?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;
    Ok(Json(UserResponse {
        state: true,
        message: "User found",
        users: user,
    }))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<UserResponse>, ApiError> {
    let payload = parse_body(&body);
    let id = parse_id(&id)?;
    if state.users.find_active(id).await?.is_none() {
        return Err(ApiError::NotFound(NOT_FOUND));
    }

    let email_taken = match submitted_email(&payload) {
        Some(email) => state.users.email_taken(&email, Some(id)).await?,
        None => false,
    };

    let input = validate_update(&payload, rules(&state, email_taken)).map_err(|errors| {
        warn!(user_id = id, ?errors, "user not updated");
        ApiError::Validation {
            message: NOT_UPDATED,
            errors,
        }
    })?;

    let password_hash = input.password.as_deref().map(hash_password).transpose()?;
    let changes = UserChanges {
        first_name: input.first_name,
        last_name: input.last_name,
        email: input.email,
        password_hash,
        address: input.address,
        phone: input.phone,
        phone_2: input.phone_2,
        postal_code: input.postal_code,
        birth_date: input.birth_date,
        gender: input.gender,
    };

    // The row may have been deleted between the lookup and the write.
    let user = state
        .users
        .update(id, &changes)
        .await
        .map_err(write_failed(NOT_UPDATED))?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;

    info!(user_id = user.id, by = session.user_id, "user updated");
    Ok(Json(UserResponse {
        state: true,
        message: "User updated",
        users: user,
    }))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id)?;
    if !state.users.soft_delete(id, OffsetDateTime::now_utc()).await? {
        return Err(ApiError::NotFound(NOT_FOUND));
    }
    info!(user_id = id, by = session.user_id, "user deleted");
    Ok(Json(MessageResponse {
        state: true,
        message: "User deleted",
    }))
}
