//! Error types for timer operations

use thiserror::Error;

use crate::timer::TimerId;

/// Errors reported by the store, runtime and persistence bridge
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimerError {
    /// Malformed input; nothing was mutated
    #[error("invalid timer: {0}")]
    Validation(String),

    /// No timer with this id exists
    #[error("timer {0} not found")]
    NotFound(TimerId),

    /// No timer references this category
    #[error("category '{0}' not found")]
    CategoryNotFound(String),

    /// The external key-value store failed to read or write
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl TimerError {
    /// Whether this error should block the action that caused it
    ///
    /// Only validation failures do; the rest are reported and the
    /// operation degrades to a no-op.
    pub fn is_blocking(&self) -> bool {
        matches!(self, TimerError::Validation(_))
    }
}

impl From<serde_json::Error> for TimerError {
    fn from(e: serde_json::Error) -> Self {
        TimerError::Persistence(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TimerError>;
