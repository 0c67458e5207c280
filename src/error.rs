//! Error types for User Interaction Events

use thiserror::Error;

/// Errors that can occur while tracking or replaying interactions
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Event queue is not defined")]
    QueueUnavailable,

    #[error("Invalid interaction event: {0}")]
    InvalidEvent(String),

    #[error("Invalid timer schedule: {0}")]
    InvalidSchedule(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
