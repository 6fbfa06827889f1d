//! Core aggregate and domain event traits.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::EventId;
use serde::{Serialize, de::DeserializeOwned};

use crate::codec::EventCodec;

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Clone + Send + Sync + std::fmt::Debug {
    /// Returns the event type name.
    ///
    /// This is the stable discriminator written next to the payload.
    fn event_type(&self) -> &'static str;

    /// Returns the globally unique id of this event.
    fn event_id(&self) -> EventId;

    /// Returns the id of the aggregate the event applies to.
    fn entity_id(&self) -> AggregateId;

    /// Returns when the fact happened.
    fn occurred_on(&self) -> DateTime<Utc>;

    /// Whether this event brings its aggregate into existence.
    ///
    /// Such an event is only accepted for an id with no history.
    fn is_creation(&self) -> bool {
        false
    }
}

/// Trait for aggregates in an event-sourced system.
///
/// An aggregate is a cluster of domain objects that can be treated as a single unit.
/// The aggregate root ensures consistency of changes being made within the aggregate.
///
/// In event sourcing, aggregates:
/// - Are rebuilt by replaying events
/// - Generate events from commands, buffering them until the caller persists them
/// - Apply events to update state (pure, deterministic)
///
/// The serialized form of an aggregate is its snapshot state; the uncommitted
/// buffer is never part of it.
pub trait Aggregate: Serialize + DeserializeOwned + Clone + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: EventCodec;

    /// The type of errors this aggregate can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name.
    ///
    /// Names the event stream and the snapshot partition.
    fn aggregate_type() -> &'static str;

    /// Returns a blank aggregate, the starting point of a replay.
    fn blank(id: AggregateId) -> Self;

    /// Returns the aggregate's unique identifier.
    fn id(&self) -> AggregateId;

    /// Applies an event to the aggregate, updating its state.
    ///
    /// This method must be pure and deterministic:
    /// - Given the same state and event, it must always produce the same new state
    /// - It must not fail (events represent facts that have happened)
    fn apply(&mut self, event: &Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events<'a>(&mut self, events: impl IntoIterator<Item = &'a Self::Event>)
    where
        Self::Event: 'a,
    {
        for event in events {
            self.apply(event);
        }
    }

    /// Events produced by commands since the buffer was last drained.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Drains the uncommitted events, leaving the buffer empty.
    fn take_uncommitted_events(&mut self) -> Vec<Self::Event>;

    /// Verifies the state invariants, describing the first violation found.
    fn check_invariants(&self) -> Result<(), String>;
}
