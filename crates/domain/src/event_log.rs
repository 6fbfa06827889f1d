//! Typed access to the event log, keeping snapshots in step with appends.

use common::{AggregateId, SharedClock};
use event_store::{EventStore, SnapshotStore, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::codec::{decode, encode};
use crate::error::DomainError;
use crate::retriever::Projection;

/// Appends typed events and refreshes the matching snapshot.
///
/// Appending and writing the snapshot are two separate steps. If the process
/// stops in between, the snapshot lags the log until the next append or a
/// rebuild; readers catch up from the log in the meantime.
pub struct EventLog<S> {
    store: S,
    clock: SharedClock,
}

impl<S> EventLog<S>
where
    S: EventStore + SnapshotStore,
{
    /// `clock` stamps the snapshots this log writes.
    pub fn new(store: S, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Appends an event, then refreshes the aggregate's snapshot.
    ///
    /// The refresh applies the event on top of the stored snapshot when that
    /// snapshot covers everything logged before it and the event is not
    /// older than anything already folded in. Otherwise the snapshot is
    /// recomputed from the full history. Returns the snapshot's new version.
    #[tracing::instrument(
        skip(self, event),
        fields(
            aggregate_type = A::aggregate_type(),
            aggregate_id = %event.entity_id(),
            event_type = event.event_type(),
        )
    )]
    pub async fn save_event<A: Aggregate>(&self, event: &A::Event) -> Result<Version, DomainError> {
        let id = event.entity_id();
        let envelope = encode(event, A::aggregate_type())?;
        let position = self.store.append(envelope).await?;
        metrics::counter!("event_log_events_appended_total", "aggregate_type" => A::aggregate_type())
            .increment(1);
        tracing::debug!(%position, occurred_on = %event.occurred_on(), "event appended");

        let events = self.store.get_events(A::aggregate_type(), id).await?;
        let prior = match self.store.get_snapshot(A::aggregate_type(), id).await? {
            Some(snapshot) => Projection::<A>::from_snapshot(&snapshot)?,
            None => Projection::blank(id),
        };

        let covers_prefix = events
            .get(prior.version.as_count())
            .is_some_and(|e| e.event_id == event.event_id())
            && events.len() == prior.version.as_count() + 1;
        let in_order = prior
            .last_occurred_on
            .is_none_or(|high_water| event.occurred_on() >= high_water);

        let projection = if covers_prefix && in_order {
            let mut projection = prior;
            projection.state.apply(event);
            projection.version = projection.version.next();
            projection.last_occurred_on = projection.last_occurred_on.max(Some(event.occurred_on()));
            projection
        } else {
            metrics::counter!(
                "event_log_snapshot_rebuilds_total",
                "aggregate_type" => A::aggregate_type()
            )
            .increment(1);
            tracing::warn!(
                snapshot_version = %prior.version,
                log_len = events.len(),
                in_order,
                "snapshot cannot absorb event incrementally, replaying history"
            );
            Projection::<A>::replay(id, &events)?
        };

        let version = projection.version;
        self.store
            .save_snapshot(projection.to_snapshot(self.clock.now())?)
            .await?;
        Ok(version)
    }

    /// Returns the aggregate's decoded events in log order.
    ///
    /// An empty history is not an error. A record with an unknown event
    /// type fails the whole read.
    pub async fn get_events<A: Aggregate>(
        &self,
        id: AggregateId,
    ) -> Result<Vec<A::Event>, DomainError> {
        let envelopes = self.store.get_events(A::aggregate_type(), id).await?;
        envelopes
            .iter()
            .map(|envelope| Ok(decode::<A::Event>(envelope)?))
            .collect()
    }

    /// Recomputes the aggregate's snapshot from its full history.
    #[tracing::instrument(skip(self), fields(aggregate_type = A::aggregate_type()))]
    pub async fn rebuild_snapshot<A: Aggregate>(&self, id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.get_events(A::aggregate_type(), id).await?;
        if events.is_empty() {
            return Err(DomainError::NotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id: id,
            });
        }

        let projection = Projection::<A>::replay(id, &events)?;
        projection.verify()?;
        self.store
            .save_snapshot(projection.to_snapshot(self.clock.now())?)
            .await?;

        metrics::counter!("event_log_snapshot_rebuilds_total", "aggregate_type" => A::aggregate_type())
            .increment(1);
        tracing::info!(version = %projection.version, "snapshot rebuilt");
        Ok(projection.state)
    }
}
