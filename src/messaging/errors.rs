//! # Messaging Error Types
//!
//! Structured error types for the queue gateway using thiserror instead of
//! `Box<dyn Error>` patterns.

use thiserror::Error;

/// Errors produced by the messaging gateway.
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("broker connection error: {message}")]
    Connection { message: String },

    #[error("queue operation failed: {queue_name}: {operation}: {message}")]
    QueueOperation {
        queue_name: String,
        operation: String,
        message: String,
    },

    #[error("message serialization error: {message}")]
    Serialization { message: String },

    #[error("message deserialization error: {message}")]
    Deserialization { message: String },

    #[error("delivery to {queue_name} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        queue_name: String,
        attempts: u32,
        message: String,
    },

    #[error("operation {operation} timed out after {timeout_seconds}s")]
    Timeout {
        operation: String,
        timeout_seconds: u64,
    },
}

impl MessagingError {
    pub fn queue_operation(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }
}
