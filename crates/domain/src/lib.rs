//! Domain layer for the planet event-sourcing engine.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - The event codec with its explicit per-type decode tables
//! - EventLog (typed appends plus snapshot refresh) and StateRetriever (replay)
//! - CommandHandler with per-aggregate locking
//! - The Planet aggregate, its events, commands and service

pub mod aggregate;
pub mod codec;
pub mod command;
pub mod error;
pub mod event_log;
pub mod locks;
pub mod planet;
pub mod retriever;

pub use aggregate::{Aggregate, DomainEvent};
pub use codec::{CodecError, EventCodec, EventHeader};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use event_log::EventLog;
pub use locks::EntityLocks;
pub use planet::{
    BLANK_PLANET_NAME, ColonizePlanet, CreatePlanet, Planet, PlanetColonizedData,
    PlanetCreatedData, PlanetError, PlanetEvent, PlanetEventKind, PlanetRenamedData,
    PlanetService, RenamePlanet,
};
pub use retriever::{Projection, StateRetriever};
