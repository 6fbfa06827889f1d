//! Planet aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;

pub use aggregate::{BLANK_PLANET_NAME, Planet};
pub use commands::*;
pub use events::{
    PLANET_COLONIZED, PLANET_CREATED, PLANET_RENAMED, PlanetColonizedData, PlanetCreatedData,
    PlanetEvent, PlanetEventKind, PlanetRenamedData,
};
pub use service::PlanetService;

use thiserror::Error;

/// Errors that can occur during planet operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanetError {
    /// The colonization fields contradict each other.
    #[error("Invalid planet state: {0}")]
    InvalidState(String),

    /// The planet already has a colonizer.
    #[error("Planet is already colonized")]
    AlreadyColonized,

    /// Only the player who colonized the planet may rename it.
    #[error("Only the colonizer can rename the planet")]
    NotColonizer,

    /// The new name is empty.
    #[error("Planet name must not be empty")]
    InvalidName,
}

impl PlanetError {
    /// Short, stable label for the rejection reason.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanetError::InvalidState(_) => "invalid_state",
            PlanetError::AlreadyColonized => "already_colonized",
            PlanetError::NotColonizer => "not_colonizer",
            PlanetError::InvalidName => "invalid_name",
        }
    }
}
