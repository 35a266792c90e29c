use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failure taxonomy for the REST surface. Every variant maps to one
/// status code; `Forbidden` additionally carries the machine-readable
/// `requiresKey` hint so clients can branch into the key prompt.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    /// Missing or invalid credentials on the request itself
    #[error("unauthorized")]
    Unauthorized,

    #[error("{message}")]
    Forbidden { message: String, requires_key: bool },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    /// An external collaborator (image host) failed
    #[error("{0}")]
    Upstream(String),

    /// Detail is logged server-side; callers get a generic message
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            requires_key: false,
        }
    }

    pub fn requires_key(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            requires_key: true,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "message": message })),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "message": "Unauthorized" }),
            ),
            ApiError::Forbidden {
                message,
                requires_key,
            } => {
                let body = if *requires_key {
                    json!({ "message": message, "requiresKey": true })
                } else {
                    json!({ "message": message })
                };
                (StatusCode::FORBIDDEN, body)
            }
            ApiError::Conflict(message) => (StatusCode::CONFLICT, json!({ "message": message })),
            ApiError::Validation(message) => {
                (StatusCode::BAD_REQUEST, json!({ "message": message }))
            }
            ApiError::Upstream(message) => (StatusCode::BAD_GATEWAY, json!({ "message": message })),
            ApiError::Internal(detail) => {
                error!("internal error: {detail:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
