//! Command handling infrastructure.

use std::marker::PhantomData;
use std::sync::Arc;

use common::{AggregateId, Clock, SharedClock};
use event_store::{EventStore, EventStoreExt, SnapshotStore, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;
use crate::event_log::EventLog;
use crate::locks::EntityLocks;
use crate::retriever::StateRetriever;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The snapshot version after the last persisted event.
    pub new_version: Version,
}

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the aggregate's current state doesn't allow the action.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Handler for executing commands against aggregates.
///
/// For one aggregate id, the handler:
/// 1. Takes the id's lock
/// 2. Loads the current state through the state retriever
/// 3. Runs the command, which buffers the events it produces
/// 4. Persists the buffered events through the event log (which refreshes the snapshot)
///
/// A rejected command persists nothing.
pub struct CommandHandler<S, A>
where
    S: EventStore + SnapshotStore + Clone,
    A: Aggregate,
{
    log: EventLog<S>,
    retriever: StateRetriever<S, A>,
    locks: EntityLocks,
    clock: SharedClock,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore + SnapshotStore + Clone,
    A: Aggregate,
    DomainError: From<A::Error>,
{
    /// Creates a new command handler over `store`, timestamping with `clock`.
    pub fn new(store: S, clock: SharedClock) -> Self {
        Self {
            log: EventLog::new(store.clone(), Arc::clone(&clock)),
            retriever: StateRetriever::new(store),
            locks: EntityLocks::new(),
            clock,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        self.log.store()
    }

    pub fn event_log(&self) -> &EventLog<S> {
        &self.log
    }

    pub fn retriever(&self) -> &StateRetriever<S, A> {
        &self.retriever
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn locks(&self) -> &EntityLocks {
        &self.locks
    }

    /// Creates a new aggregate.
    ///
    /// Fails with `Conflict` if the id already has a snapshot or any events.
    pub async fn create<F>(&self, id: AggregateId, factory: F) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&dyn Clock) -> Result<A, A::Error>,
    {
        let _guard = self.locks.lock(id).await;

        if self.store().aggregate_exists(A::aggregate_type(), id).await? {
            return Err(self.rejected(DomainError::Conflict {
                aggregate_type: A::aggregate_type(),
                aggregate_id: id,
            }));
        }

        let aggregate = factory(self.clock()).map_err(|e| self.rejected(e.into()))?;
        self.persist(aggregate).await
    }

    /// Executes a command against the current state of an existing aggregate.
    ///
    /// The command function mutates the aggregate through its command
    /// methods, which buffer the resulting events.
    pub async fn execute<F>(
        &self,
        id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&mut A, &dyn Clock) -> Result<(), A::Error>,
    {
        let _guard = self.locks.lock(id).await;

        let mut aggregate = self.retriever.get_current_state(id).await?;
        command_fn(&mut aggregate, self.clock()).map_err(|e| self.rejected(e.into()))?;
        self.persist(aggregate).await
    }

    /// Appends an event produced outside of a command, such as an import or
    /// a backfill, under the same per-id lock commands take.
    ///
    /// A creation event for an id that already has a snapshot or events is
    /// rejected with `Conflict`, as `create` would be. Returns the current
    /// state afterwards.
    pub async fn append_external(&self, event: A::Event) -> Result<A, DomainError> {
        let id = event.entity_id();
        let _guard = self.locks.lock(id).await;

        if event.is_creation() && self.store().aggregate_exists(A::aggregate_type(), id).await? {
            return Err(self.rejected(DomainError::Conflict {
                aggregate_type: A::aggregate_type(),
                aggregate_id: id,
            }));
        }

        self.log.save_event::<A>(&event).await?;
        self.retriever.get_current_state(id).await
    }

    /// Recomputes the aggregate's snapshot from its full history, under the
    /// same per-id lock commands take.
    pub async fn rebuild_snapshot(&self, id: AggregateId) -> Result<A, DomainError> {
        let _guard = self.locks.lock(id).await;
        self.log.rebuild_snapshot::<A>(id).await
    }

    async fn persist(&self, mut aggregate: A) -> Result<CommandResult<A>, DomainError> {
        let events = aggregate.take_uncommitted_events();
        let mut new_version = Version::initial();
        for event in &events {
            new_version = self.log.save_event::<A>(event).await?;
        }

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    fn rejected(&self, error: DomainError) -> DomainError {
        metrics::counter!(
            "commands_rejected_total",
            "aggregate_type" => A::aggregate_type(),
            "reason" => error.kind()
        )
        .increment(1);
        tracing::debug!(aggregate_type = A::aggregate_type(), %error, "command rejected");
        error
    }
}
