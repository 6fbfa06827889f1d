//! Admin error types.

use domain::DomainError;
use event_store::EventStoreError;
use thiserror::Error;

/// Errors surfaced by the admin CLI.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The environment holds an unusable setting.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    /// Connecting to PostgreSQL failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Writing a report line failed.
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// `verify` found planets whose snapshot disagrees with their history.
    #[error("{problems} planet(s) failed verification")]
    VerifyFailed { problems: usize },

    /// `rebuild` could not rebuild every planet.
    #[error("{failures} planet(s) could not be rebuilt")]
    RebuildFailed { failures: usize },
}
