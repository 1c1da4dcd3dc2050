//! Crate-wide error type and its HTTP rendering.
//!
//! Cache faults never appear here: they are absorbed by the resolver and the
//! reconciliation job (see [`crate::infrastructure::cache::CacheError`]).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

/// Machine-readable error payload returned to HTTP clients.
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub details: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed short code or long URL.
    #[error("{message}")]
    InvalidFormat { message: String, details: Value },

    /// Short code unknown to the durable store.
    #[error("{message}")]
    NotFound { message: String, details: Value },

    /// Unique-key violation in the durable store.
    #[error("{message}")]
    Conflict { message: String, details: Value },

    /// Every candidate code drawn by the generator was already taken.
    #[error("failed to allocate a unique short code after {attempts} attempts")]
    GenerationExhausted { attempts: usize },

    /// The durable store could not serve the request.
    #[error("durable store unavailable: {0}")]
    StoreUnavailable(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::InvalidFormat {
            message: message.into(),
            details,
        }
    }

    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }

    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Self::Conflict {
            message: message.into(),
            details,
        }
    }

    /// Whether retrying the same store operation might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    fn parts(&self) -> (StatusCode, &'static str, Value) {
        match self {
            Self::InvalidFormat { details, .. } => {
                (StatusCode::BAD_REQUEST, "invalid_format", details.clone())
            }
            Self::NotFound { details, .. } => (StatusCode::NOT_FOUND, "not_found", details.clone()),
            Self::Conflict { details, .. } => (StatusCode::CONFLICT, "conflict", details.clone()),
            Self::GenerationExhausted { attempts } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "generation_exhausted",
                json!({ "attempts": attempts }),
            ),
            // Store internals stay in the logs.
            Self::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
                json!({}),
            ),
        }
    }

    /// Converts the error into the JSON payload used in API responses.
    pub fn to_error_info(&self) -> ErrorInfo {
        let (_, code, details) = self.parts();
        let message = match self {
            Self::StoreUnavailable(_) => "Storage is temporarily unavailable".to_string(),
            other => other.to_string(),
        };

        ErrorInfo {
            code,
            message,
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, _, _) = self.parts();

        if let Self::StoreUnavailable(reason) = &self {
            tracing::error!("Request failed on durable store: {}", reason);
        }

        let body = ErrorBody {
            error: self.to_error_info(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error()
            && db.is_unique_violation()
        {
            return AppError::conflict(
                "Unique constraint violation",
                json!({ "constraint": db.constraint() }),
            );
        }

        AppError::StoreUnavailable(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::bad_request("Request validation failed", json!(e))
    }
}
