//! Crate-wide error type.
//!
//! Mirrors the error kinds named in the error handling design: one variant
//! per failure domain, propagated with `?` rather than panicking.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventlineError {
    #[error("unknown message type: {0}")]
    UnknownMessage(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("concurrent append: {0}")]
    ConcurrentAppend(String),

    #[error("store backend error: {0}")]
    BackendError(String),

    #[error("reactor error: {0}")]
    ReactorError(String),

    #[error("scheduled message date is not in the future: {0}")]
    PastMessageDate(String),

    #[error("consumer group not found: {0}")]
    GroupNotFound(String),

    #[error("consumer group stopped: {0}")]
    GroupStopped(String),

    #[error("offset not found: {0}")]
    OffsetNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EventlineError>;
