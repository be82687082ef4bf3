use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::users::repo::StoreError;

/// Per-field validation messages, keyed by the request field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: &'static str,
        errors: FieldErrors,
    },

    #[error("invalid login payload")]
    InvalidLogin(FieldErrors),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Other(e) => ApiError::Internal(e),
            // Writes map this to a field error themselves; anywhere else it is unexpected.
            taken @ StoreError::EmailTaken => ApiError::Internal(taken.into()),
        }
    }
}

/// Envelope used by the user resource routes.
#[derive(Debug, Serialize)]
struct StateBody<'a> {
    state: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a FieldErrors>,
}

/// Envelope used by the auth routes.
#[derive(Debug, Serialize)]
struct StatusBody<'a> {
    status: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a FieldErrors>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Validation { message, errors } => (
                StatusCode::BAD_REQUEST,
                Json(StateBody {
                    state: false,
                    message,
                    errors: Some(errors),
                }),
            )
                .into_response(),
            ApiError::InvalidLogin(errors) => (
                StatusCode::BAD_REQUEST,
                Json(StatusBody {
                    status: "error",
                    message: "Validation failed",
                    errors: Some(errors),
                }),
            )
                .into_response(),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(StatusBody {
                    status: "error",
                    message: "Unauthorized",
                    errors: None,
                }),
            )
                .into_response(),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(StateBody {
                    state: false,
                    message,
                    errors: None,
                }),
            )
                .into_response(),
            ApiError::Internal(e) => {
                error!(error = ?e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(StateBody {
                        state: false,
                        message: "Internal server error",
                        errors: None,
                    }),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        let cases = [
            (
                ApiError::Validation {
                    message: "User not created",
                    errors: FieldErrors::new(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::InvalidLogin(FieldErrors::new()), StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ApiError::NotFound("User not found"), StatusCode::NOT_FOUND),
            (
                ApiError::Internal(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn store_errors_outside_writes_are_internal() {
        let err = ApiError::from(StoreError::EmailTaken);
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(
            ApiError::from(StoreError::Other(anyhow::anyhow!("db down"))),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn display_uses_envelope_message() {
        assert_eq!(ApiError::Unauthorized.to_string(), "Unauthorized");
        assert_eq!(ApiError::NotFound("User not found").to_string(), "User not found");
    }
}
