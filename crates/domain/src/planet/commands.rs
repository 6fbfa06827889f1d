//! Planet commands.

use chrono::{DateTime, Utc};
use common::{AggregateId, PlayerId};

use crate::command::Command;

use super::Planet;

/// Command to create a new planet.
#[derive(Debug, Clone)]
pub struct CreatePlanet {
    /// The planet ID to create.
    pub planet_id: AggregateId,

    pub name: String,

    pub is_colonized: bool,

    pub colonized_by: Option<PlayerId>,

    pub colonized_at: Option<DateTime<Utc>>,
}

impl CreatePlanet {
    /// Creates a command for an uncolonized planet.
    pub fn new(planet_id: AggregateId, name: impl Into<String>) -> Self {
        Self {
            planet_id,
            name: name.into(),
            is_colonized: false,
            colonized_by: None,
            colonized_at: None,
        }
    }

    /// Creates a command for a planet that starts out colonized.
    pub fn colonized(
        planet_id: AggregateId,
        name: impl Into<String>,
        colonized_by: PlayerId,
        colonized_at: DateTime<Utc>,
    ) -> Self {
        Self {
            planet_id,
            name: name.into(),
            is_colonized: true,
            colonized_by: Some(colonized_by),
            colonized_at: Some(colonized_at),
        }
    }
}

impl Command for CreatePlanet {
    type Aggregate = Planet;

    fn aggregate_id(&self) -> AggregateId {
        self.planet_id
    }
}

/// Command to colonize a planet.
#[derive(Debug, Clone)]
pub struct ColonizePlanet {
    pub planet_id: AggregateId,

    /// The colonizing player.
    pub player_id: PlayerId,
}

impl ColonizePlanet {
    pub fn new(planet_id: AggregateId, player_id: PlayerId) -> Self {
        Self {
            planet_id,
            player_id,
        }
    }
}

impl Command for ColonizePlanet {
    type Aggregate = Planet;

    fn aggregate_id(&self) -> AggregateId {
        self.planet_id
    }
}

/// Command to rename a planet.
#[derive(Debug, Clone)]
pub struct RenamePlanet {
    pub planet_id: AggregateId,

    pub new_name: String,

    /// The player asking for the rename; must be the colonizer.
    pub player_id: PlayerId,
}

impl RenamePlanet {
    pub fn new(planet_id: AggregateId, new_name: impl Into<String>, player_id: PlayerId) -> Self {
        Self {
            planet_id,
            new_name: new_name.into(),
            player_id,
        }
    }
}

impl Command for RenamePlanet {
    type Aggregate = Planet;

    fn aggregate_id(&self) -> AggregateId {
        self.planet_id
    }
}
