use thiserror::Error;

use crate::EventId;

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// An event with the same id is already in the stream.
    #[error("Duplicate event: {0} is already stored")]
    DuplicateEvent(EventId),

    /// The envelope is missing required data.
    #[error("Invalid event envelope: {0}")]
    InvalidEnvelope(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A filesystem error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
