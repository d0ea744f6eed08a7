//! Spoke coordination error types.

use thiserror::Error;

/// Errors raised while talking to spoke agents or the desired-state API.
#[derive(Debug, Error)]
pub enum SpokeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("http client error: {0}")]
    Client(String),

    #[error("worker pool is full")]
    PoolFull,

    #[error("worker pool is closed")]
    PoolClosed,
}

pub type SpokeResult<T> = Result<T, SpokeError>;
