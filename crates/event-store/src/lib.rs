//! Storage layer for the planet event-sourcing engine.
//!
//! Events are kept as untyped JSON envelopes in one append-only stream per
//! aggregate type; snapshots hold the latest projection per aggregate id.
//! Three backends share the same traits: in-memory, JSON files, PostgreSQL.

pub mod error;
pub mod event;
pub mod file;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Position, Version};
pub use file::FileEventStore;
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use snapshot::Snapshot;
pub use store::{EventStore, EventStoreExt, SnapshotStore};
