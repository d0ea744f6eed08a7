//! Error types for the spoke state registry.

use thiserror::Error;

/// Result type alias for registry operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while recording spoke state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid status report: {0}")]
    Validation(String),
}
