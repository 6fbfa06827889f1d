//! Shared types for the planet event-sourcing engine.

pub mod clock;
pub mod types;

pub use clock::{Clock, FixedClock, ManualClock, SharedClock, SystemClock};
pub use types::{AggregateId, PlayerId};
