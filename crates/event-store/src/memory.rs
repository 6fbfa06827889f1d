use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Position, Result, Snapshot,
    store::{EventStore, SnapshotStore, validate_envelope_for_append},
};

type SnapshotKey = (String, AggregateId);

/// In-memory event store implementation for testing.
///
/// This implementation keeps every stream in memory and provides
/// the same interface as the file and PostgreSQL implementations.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<HashMap<String, Vec<EventEnvelope>>>>,
    snapshots: Arc<RwLock<HashMap<SnapshotKey, Snapshot>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored across all streams.
    pub async fn event_count(&self) -> usize {
        self.streams.read().await.values().map(Vec::len).sum()
    }

    /// Clears all events and snapshots.
    pub async fn clear(&self) {
        self.streams.write().await.clear();
        self.snapshots.write().await.clear();
    }
}

/// Places `event` at the end of `stream`, rejecting duplicate ids.
pub(crate) fn push_to_stream(
    stream: &mut Vec<EventEnvelope>,
    event: EventEnvelope,
) -> Result<Position> {
    if stream.iter().any(|e| e.event_id == event.event_id) {
        return Err(EventStoreError::DuplicateEvent(event.event_id));
    }

    let last = stream.last().map(|e| e.position.as_i64()).unwrap_or(0);
    let position = Position::new(last + 1);
    stream.push(event.at_position(position));
    Ok(position)
}

/// Distinct aggregate ids of a stream, in order of first appearance.
pub(crate) fn distinct_ids(stream: &[EventEnvelope]) -> Vec<AggregateId> {
    let mut ids: Vec<AggregateId> = Vec::new();
    for event in stream {
        if !ids.contains(&event.aggregate_id) {
            ids.push(event.aggregate_id);
        }
    }
    ids
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: EventEnvelope) -> Result<Position> {
        validate_envelope_for_append(&event)?;

        let mut streams = self.streams.write().await;
        let stream = streams.entry(event.aggregate_type.clone()).or_default();
        push_to_stream(stream, event)
    }

    async fn get_events(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let streams = self.streams.read().await;
        let events = streams
            .get(aggregate_type)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|e| e.aggregate_id == aggregate_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(events)
    }

    async fn aggregate_ids(&self, aggregate_type: &str) -> Result<Vec<AggregateId>> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(aggregate_type)
            .map(|stream| distinct_ids(stream))
            .unwrap_or_default())
    }
}

#[async_trait]
impl SnapshotStore for InMemoryEventStore {
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        let key = (snapshot.aggregate_type.clone(), snapshot.aggregate_id);
        snapshots.insert(key, snapshot);
        Ok(())
    }

    async fn get_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Option<Snapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(&(aggregate_type.to_string(), aggregate_id))
            .cloned())
    }

    async fn get_all_snapshots(&self, aggregate_type: &str) -> Result<Vec<Snapshot>> {
        let snapshots = self.snapshots.read().await;
        let mut all: Vec<Snapshot> = snapshots
            .values()
            .filter(|s| s.aggregate_type == aggregate_type)
            .cloned()
            .collect();
        all.sort_by_key(|s| s.aggregate_id.as_uuid());
        Ok(all)
    }
}
