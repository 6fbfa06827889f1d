//! Reconstruction of aggregate state from snapshots and the event log.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventEnvelope, EventStore, EventStoreExt, Snapshot, SnapshotStore, Version};

use crate::aggregate::Aggregate;
use crate::codec::{CodecError, decode};
use crate::error::DomainError;

/// An aggregate state together with how much of the log it covers.
#[derive(Debug, Clone)]
pub struct Projection<A> {
    pub state: A,
    /// Number of log events folded into `state`.
    pub version: Version,
    /// Greatest `occurred_on` among the folded events.
    pub last_occurred_on: Option<DateTime<Utc>>,
}

impl<A: Aggregate> Projection<A> {
    /// The projection of an aggregate with no history.
    pub fn blank(id: AggregateId) -> Self {
        Self {
            state: A::blank(id),
            version: Version::initial(),
            last_occurred_on: None,
        }
    }

    /// Restores the projection stored in a snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, CodecError> {
        let state = snapshot
            .state_as::<A>()
            .map_err(|source| CodecError::MalformedSnapshot {
                aggregate_type: A::aggregate_type(),
                source,
            })?;

        Ok(Self {
            state,
            version: snapshot.version,
            last_occurred_on: snapshot.last_occurred_on,
        })
    }

    /// Serializes the projection into a snapshot written at `timestamp`.
    pub fn to_snapshot(&self, timestamp: DateTime<Utc>) -> Result<Snapshot, CodecError> {
        Ok(Snapshot::from_state(
            self.state.id(),
            A::aggregate_type(),
            self.version,
            self.last_occurred_on,
            timestamp,
            &self.state,
        )?)
    }

    /// Applies one stored event on top of the projection.
    pub fn fold(&mut self, envelope: &EventEnvelope) -> Result<(), CodecError> {
        let event: A::Event = decode(envelope)?;
        self.state.apply(&event);
        self.version = self.version.next();
        self.last_occurred_on = self.last_occurred_on.max(Some(envelope.occurred_on));
        Ok(())
    }

    /// Replays a whole history from a blank aggregate.
    ///
    /// `envelopes` is the aggregate's log in append order; they are applied
    /// ordered by `occurred_on`, with log position breaking ties.
    pub fn replay(id: AggregateId, envelopes: &[EventEnvelope]) -> Result<Self, CodecError> {
        let mut projection = Self::blank(id);
        for envelope in sorted_for_replay(envelopes) {
            projection.fold(envelope)?;
        }
        Ok(projection)
    }

    /// Checks the invariants of the projected state.
    pub fn verify(&self) -> Result<(), DomainError> {
        self.state.check_invariants().map_err(|reason| {
            tracing::error!(
                aggregate_type = A::aggregate_type(),
                aggregate_id = %self.state.id(),
                %reason,
                "replayed state violates invariants"
            );
            DomainError::CorruptedHistory {
                aggregate_type: A::aggregate_type(),
                aggregate_id: self.state.id(),
                reason,
            }
        })
    }
}

/// Orders envelopes by `(occurred_on, position)` without copying them.
pub fn sorted_for_replay(envelopes: &[EventEnvelope]) -> Vec<&EventEnvelope> {
    let mut ordered: Vec<&EventEnvelope> = envelopes.iter().collect();
    ordered.sort_by(|a, b| {
        a.occurred_on
            .cmp(&b.occurred_on)
            .then(a.position.cmp(&b.position))
    });
    ordered
}

/// Answers "what did this aggregate look like" from the stores.
pub struct StateRetriever<S, A> {
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> StateRetriever<S, A>
where
    S: EventStore + SnapshotStore,
    A: Aggregate,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the snapshot state as stored, without looking at the log.
    pub async fn get_initial_state(&self, id: AggregateId) -> Result<A, DomainError> {
        let snapshot = self.require_snapshot(id).await?;
        Ok(Projection::<A>::from_snapshot(&snapshot)?.state)
    }

    /// Returns every snapshot state of the aggregate type.
    pub async fn list_initial_states(&self) -> Result<Vec<A>, DomainError> {
        let snapshots = self.store.get_all_snapshots(A::aggregate_type()).await?;
        snapshots
            .iter()
            .map(|snapshot| Ok(Projection::<A>::from_snapshot(snapshot)?.state))
            .collect()
    }

    /// Returns the state after every logged event, in time order.
    pub async fn get_current_state(&self, id: AggregateId) -> Result<A, DomainError> {
        Ok(self.get_current_projection(id).await?.state)
    }

    /// Like [`get_current_state`](Self::get_current_state), keeping the
    /// coverage information.
    ///
    /// Starts from the snapshot and applies the events it does not cover
    /// (`log[version..]`). If one of those is older than the snapshot's
    /// high-water mark, applying it on top would put it out of order, so the
    /// whole log is replayed from a blank aggregate instead.
    pub async fn get_current_projection(
        &self,
        id: AggregateId,
    ) -> Result<Projection<A>, DomainError> {
        let (snapshot, events) = self.store.load_aggregate(A::aggregate_type(), id).await?;
        let snapshot = snapshot.ok_or(DomainError::NotFound {
            aggregate_type: A::aggregate_type(),
            aggregate_id: id,
        })?;
        let projection = Projection::<A>::from_snapshot(&snapshot)?;

        let covered = projection.version.as_count();
        let projection = if covered > events.len() {
            tracing::warn!(
                aggregate_type = A::aggregate_type(),
                aggregate_id = %id,
                snapshot_version = %projection.version,
                log_len = events.len(),
                "snapshot claims more events than the log holds, replaying"
            );
            self.replay(id, &events)?
        } else {
            let unapplied = &events[covered..];
            let backfilled = match projection.last_occurred_on {
                Some(high_water) => unapplied.iter().any(|e| e.occurred_on < high_water),
                None => false,
            };

            if backfilled {
                tracing::debug!(
                    aggregate_type = A::aggregate_type(),
                    aggregate_id = %id,
                    "unapplied event predates snapshot, replaying"
                );
                self.replay(id, &events)?
            } else {
                let mut projection = projection;
                for envelope in sorted_for_replay(unapplied) {
                    projection.fold(envelope)?;
                }
                projection
            }
        };

        projection.verify()?;
        Ok(projection)
    }

    fn replay(&self, id: AggregateId, events: &[EventEnvelope]) -> Result<Projection<A>, DomainError> {
        metrics::counter!("state_retriever_replays_total", "aggregate_type" => A::aggregate_type())
            .increment(1);
        Ok(Projection::replay(id, events)?)
    }

    async fn require_snapshot(&self, id: AggregateId) -> Result<Snapshot, DomainError> {
        self.store
            .get_snapshot(A::aggregate_type(), id)
            .await?
            .ok_or(DomainError::NotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id: id,
            })
    }
}
