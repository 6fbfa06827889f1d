//! Planet service providing the command and query API for planets.

use common::{AggregateId, Clock, SharedClock};
use event_store::{EventStore, SnapshotStore};

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{ColonizePlanet, CreatePlanet, Planet, PlanetError, PlanetEvent, RenamePlanet};

impl From<PlanetError> for DomainError {
    fn from(e: PlanetError) -> Self {
        DomainError::Planet(e)
    }
}

/// Service for managing planets.
///
/// Wraps the command handler, which serializes work per planet id, and its
/// state retriever.
pub struct PlanetService<S>
where
    S: EventStore + SnapshotStore + Clone,
{
    handler: CommandHandler<S, Planet>,
}

impl<S> PlanetService<S>
where
    S: EventStore + SnapshotStore + Clone,
{
    /// Creates a new planet service over `store`.
    pub fn new(store: S, clock: SharedClock) -> Self {
        Self {
            handler: CommandHandler::new(store, clock),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Planet> {
        &self.handler
    }

    /// Creates a new planet.
    #[tracing::instrument(skip(self))]
    pub async fn create_planet(&self, cmd: CreatePlanet) -> Result<Planet, DomainError> {
        let CreatePlanet {
            planet_id,
            name,
            is_colonized,
            colonized_by,
            colonized_at,
        } = cmd;

        let result = self
            .handler
            .create(planet_id, |clock| {
                Planet::create(
                    planet_id,
                    name,
                    is_colonized,
                    colonized_by,
                    colonized_at,
                    clock,
                )
            })
            .await?;
        Ok(result.aggregate)
    }

    /// Colonizes a planet.
    #[tracing::instrument(skip(self))]
    pub async fn colonize_planet(&self, cmd: ColonizePlanet) -> Result<Planet, DomainError> {
        let player_id = cmd.player_id;

        self.execute(cmd.planet_id, |planet, clock| {
            planet.colonize(player_id, clock)
        })
        .await
    }

    /// Renames a planet on behalf of its colonizer.
    #[tracing::instrument(skip(self))]
    pub async fn rename_planet(&self, cmd: RenamePlanet) -> Result<Planet, DomainError> {
        let RenamePlanet {
            planet_id,
            new_name,
            player_id,
        } = cmd;

        self.execute(planet_id, |planet, clock| {
            planet.rename(new_name, player_id, clock)
        })
        .await
    }

    /// Appends an event produced elsewhere (an import or a backfill).
    ///
    /// The event may be older than events already logged; the planet's state
    /// is recomputed in time order. A `PlanetCreated` for a planet that
    /// already has history fails with `Conflict`. Returns the resulting
    /// current state.
    #[tracing::instrument(skip(self, event))]
    pub async fn import_event(&self, event: PlanetEvent) -> Result<Planet, DomainError> {
        self.handler.append_external(event).await
    }

    /// Recomputes the planet's snapshot from its full history.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_snapshot(&self, planet_id: AggregateId) -> Result<Planet, DomainError> {
        self.handler.rebuild_snapshot(planet_id).await
    }

    /// Returns the planet after every logged event.
    #[tracing::instrument(skip(self))]
    pub async fn get_current_state(&self, planet_id: AggregateId) -> Result<Planet, DomainError> {
        self.handler.retriever().get_current_state(planet_id).await
    }

    /// Returns the planet as recorded in its snapshot.
    #[tracing::instrument(skip(self))]
    pub async fn get_initial_state(&self, planet_id: AggregateId) -> Result<Planet, DomainError> {
        self.handler.retriever().get_initial_state(planet_id).await
    }

    /// Returns the snapshot state of every planet.
    #[tracing::instrument(skip(self))]
    pub async fn list_all_initial_states(&self) -> Result<Vec<Planet>, DomainError> {
        self.handler.retriever().list_initial_states().await
    }

    /// Returns the planet's events in log order.
    #[tracing::instrument(skip(self))]
    pub async fn events(&self, planet_id: AggregateId) -> Result<Vec<PlanetEvent>, DomainError> {
        self.handler.event_log().get_events::<Planet>(planet_id).await
    }

    async fn execute<F>(&self, planet_id: AggregateId, command_fn: F) -> Result<Planet, DomainError>
    where
        F: FnOnce(&mut Planet, &dyn Clock) -> Result<(), PlanetError>,
    {
        let CommandResult { aggregate, .. } = self.handler.execute(planet_id, command_fn).await?;
        Ok(aggregate)
    }
}
