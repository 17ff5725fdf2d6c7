//! Error types for the evaluation engine.

use std::fmt::{Display, Formatter};

/// Engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Malformed or missing fields in a request; nothing was written.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Uniqueness or referential violation in the store.
    #[error("constraint violation: {message}")]
    Constraint { message: String },

    /// Model call failed after all attempts.
    #[error("judge invocation failed after {attempts} attempt(s): {message}")]
    Invocation { attempts: u32, message: String },

    /// Lookup miss.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("dispatch cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EvalError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for EvalError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Constraint {
                    message: msg.clone().unwrap_or_else(|| e.to_string()),
                }
            }
            _ => Self::Storage(err),
        }
    }
}

/// Result type for engine operations.
pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConfigError: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}
