//! Reconciler error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("vdc not found: {0}")]
    NotFound(String),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
