//! # Error Types
//!
//! Crate-level error taxonomy for the orchestration core. Synchronous call
//! paths (status queries, statistics, snapshot preview) propagate these
//! directly; the asynchronous optimization flow records them on the owning
//! task's `error_message` instead, since the triggering caller has already
//! received its response.

use thiserror::Error;

use crate::messaging::MessagingError;

/// Errors surfaced by the orchestration core.
#[derive(Debug, Error)]
pub enum TimetablerError {
    /// A referenced task or assignment does not exist. Fatal to the calling
    /// operation; maps to a 404 on the web surface.
    #[error("not found: {0}")]
    NotFound(String),

    /// The collected snapshot is too incomplete to dispatch.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Messaging delivery or request/reply failure.
    #[error("transport error: {0}")]
    Transport(#[from] MessagingError),

    /// The transactional apply of solver output failed and was rolled back.
    #[error("reconciliation failed: {0}")]
    Reconciliation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, TimetablerError>;
