//! Short code generation and format validation.
//!
//! Codes are 6 characters drawn uniformly from the 62 ASCII alphanumerics.
//! Uniqueness is checked against the durable store, never the cache.

use std::sync::{Arc, LazyLock};

use rand::Rng;
use rand::distr::Alphanumeric;
use regex::Regex;
use serde_json::json;
use tracing::debug;

use crate::domain::repositories::MappingRepository;
use crate::error::AppError;

/// Fixed length of every short code.
pub const CODE_LENGTH: usize = 6;

/// Draws attempted before giving up with [`AppError::GenerationExhausted`].
pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

static CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{6}$").expect("code pattern is valid"));

/// Draws a random candidate code. Uniqueness is not checked here.
pub fn draw_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LENGTH)
        .map(char::from)
        .collect()
}

/// Returns true if `code` has the short code format.
pub fn is_valid_code(code: &str) -> bool {
    CODE_REGEX.is_match(code)
}

/// Validates the short code format.
///
/// # Errors
///
/// Returns [`AppError::InvalidFormat`] unless `code` is exactly 6 ASCII
/// letters or digits.
pub fn validate_code(code: &str) -> Result<(), AppError> {
    if is_valid_code(code) {
        Ok(())
    } else {
        Err(AppError::bad_request(
            "Invalid short code format",
            json!({ "code": code, "expected": "6 alphanumeric characters" }),
        ))
    }
}

/// Allocates codes that are not yet present in the durable store.
pub struct CodeGenerator {
    mappings: Arc<dyn MappingRepository>,
    max_attempts: usize,
}

impl CodeGenerator {
    pub fn new(mappings: Arc<dyn MappingRepository>) -> Self {
        Self {
            mappings,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Draws candidates until one is unused in the store.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::GenerationExhausted`] after `max_attempts` collisions.
    /// Store errors are propagated as-is.
    pub async fn generate(&self) -> Result<String, AppError> {
        for attempt in 1..=self.max_attempts {
            let code = draw_code();

            if !self.mappings.exists(&code).await? {
                return Ok(code);
            }

            debug!("Code collision on attempt {}: {}", attempt, code);
        }

        Err(AppError::GenerationExhausted {
            attempts: self.max_attempts,
        })
    }
}
