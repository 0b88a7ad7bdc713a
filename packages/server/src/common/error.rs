use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Field name -> human readable messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Errors surfaced to chat callers.
///
/// Validation and authorization failures are raised before any write.
/// `Transaction` means the atomic write was rolled back in full.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Request understood but refused in the current state, e.g. leaving a
    /// room the caller is not in.
    #[error("{error}: {description}")]
    Rejected {
        error: &'static str,
        description: &'static str,
    },

    #[error("transaction failed: {0}")]
    Transaction(#[source] anyhow::Error),

    #[error("socket authentication failed: {0}")]
    SocketAuthFailure(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ChatError {
    /// Single-field validation error.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ChatError::Validation(errors)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ChatError::Unauthorized | ChatError::SocketAuthFailure(_) => StatusCode::FORBIDDEN,
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::Transaction(_) | ChatError::Rejected { .. } => StatusCode::BAD_REQUEST,
            ChatError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ChatError {
    fn from(err: sqlx::Error) -> Self {
        ChatError::Internal(err.into())
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ChatError::Validation(errors) => {
                let mut body = json!({
                    "error": "failed_validation",
                    "error_description": "One or more fields failed validation.",
                });
                if let Some(map) = body.as_object_mut() {
                    for (field, messages) in errors {
                        map.insert(field.clone(), json!(messages));
                    }
                }
                body
            }
            ChatError::Unauthorized => json!({
                "error": "unauthorized",
                "error_description": "Unauthorized access.",
            }),
            ChatError::NotFound(what) => json!({
                "error": "not_found",
                "error_description": format!("{} not found.", what),
            }),
            ChatError::Rejected { error, description } => json!({
                "error": error,
                "error_description": description,
            }),
            ChatError::Transaction(err) => {
                error!(error = ?err, "chat transaction rolled back");
                json!({
                    "error": "transaction_failure",
                    "error_description": "The request could not be completed.",
                })
            }
            ChatError::SocketAuthFailure(detail) => {
                error!(detail = %detail, "socket authentication failure");
                json!({
                    "error": "socket_authentication_failure",
                    "error_description": "Unable to authorize channel subscription.",
                })
            }
            ChatError::Internal(err) => {
                error!(error = ?err, "internal error");
                json!({
                    "error": "internal_error",
                    "error_description": "Something went wrong.",
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Failures on the best-effort delivery side (real-time publish, push).
///
/// These are logged and swallowed; the committed rows stay the source of truth.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("publish to {channel} failed: {source}")]
    Publish {
        channel: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("push to user {user_id} failed: {source}")]
    Push {
        user_id: String,
        #[source]
        source: anyhow::Error,
    },
}
