use async_trait::async_trait;

use crate::{AggregateId, EventEnvelope, EventStoreError, Position, Result, Snapshot};

/// Append-only event log, one stream per aggregate type.
///
/// All implementations must be thread-safe (Send + Sync). Nothing is ever
/// updated or deleted; out-of-order timestamps are accepted as-is.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends one event to the stream named by its `aggregate_type`.
    ///
    /// Returns the position assigned to the event. Fails with
    /// `DuplicateEvent` if an event with the same id is already stored.
    async fn append(&self, event: EventEnvelope) -> Result<Position>;

    /// Retrieves all events for one aggregate, in log (append) order.
    async fn get_events(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Lists every aggregate id that has at least one event, in order of
    /// first appearance.
    async fn aggregate_ids(&self, aggregate_type: &str) -> Result<Vec<AggregateId>>;
}

/// Keyed store of the latest projection per aggregate.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Saves a snapshot, replacing any previous one for the same aggregate.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    /// Retrieves the snapshot for an aggregate, if any.
    async fn get_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Option<Snapshot>>;

    /// Retrieves every snapshot of an aggregate type.
    async fn get_all_snapshots(&self, aggregate_type: &str) -> Result<Vec<Snapshot>>;
}

/// Extension trait providing convenience methods for stores that hold both
/// events and snapshots.
#[async_trait]
pub trait EventStoreExt: EventStore + SnapshotStore {
    /// Checks if an aggregate exists (has a snapshot or any events).
    async fn aggregate_exists(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<bool> {
        if self
            .get_snapshot(aggregate_type, aggregate_id)
            .await?
            .is_some()
        {
            return Ok(true);
        }
        Ok(!self.get_events(aggregate_type, aggregate_id).await?.is_empty())
    }

    /// Loads an aggregate's snapshot together with its full event history.
    ///
    /// Events are returned in log order; the caller decides which of them
    /// the snapshot already covers.
    async fn load_aggregate(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<(Option<Snapshot>, Vec<EventEnvelope>)> {
        let snapshot = self.get_snapshot(aggregate_type, aggregate_id).await?;
        let events = self.get_events(aggregate_type, aggregate_id).await?;
        Ok((snapshot, events))
    }
}

impl<T: EventStore + SnapshotStore + ?Sized> EventStoreExt for T {}

/// Validates an envelope before appending.
pub fn validate_envelope_for_append(event: &EventEnvelope) -> Result<()> {
    if event.event_type.trim().is_empty() {
        return Err(EventStoreError::InvalidEnvelope(
            "event_type must not be empty".to_string(),
        ));
    }
    if event.aggregate_type.trim().is_empty() {
        return Err(EventStoreError::InvalidEnvelope(
            "aggregate_type must not be empty".to_string(),
        ));
    }
    Ok(())
}
