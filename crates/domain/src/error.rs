//! Domain error types.

use common::AggregateId;
use event_store::EventStoreError;
use thiserror::Error;

use crate::codec::CodecError;
use crate::planet::PlanetError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The planet aggregate rejected a command.
    #[error("Planet error: {0}")]
    Planet(PlanetError),

    /// No snapshot exists for the aggregate.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    NotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    /// The aggregate already has a snapshot or history.
    #[error("Aggregate already exists: {aggregate_type} with id {aggregate_id}")]
    Conflict {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    /// An event or snapshot could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] CodecError),

    /// Replaying the history produced a state that breaks an invariant.
    #[error("Corrupted history for {aggregate_type} {aggregate_id}: {reason}")]
    CorruptedHistory {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
        reason: String,
    },
}

impl DomainError {
    /// Short, stable label for the error kind, used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::EventStore(_) => "event_store",
            DomainError::Planet(e) => e.kind(),
            DomainError::NotFound { .. } => "not_found",
            DomainError::Conflict { .. } => "conflict",
            DomainError::Serialization(_) => "serialization",
            DomainError::CorruptedHistory { .. } => "corrupted_history",
        }
    }
}
