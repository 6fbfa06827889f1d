//! Operator tooling for the planet event-sourcing engine.
//!
//! Opens the configured backend and runs one inspection or maintenance
//! command against it.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod telemetry;

use std::io::Write;
use std::sync::Arc;

use common::{SharedClock, SystemClock};
use domain::PlanetService;
use event_store::{FileEventStore, PostgresEventStore};
use sqlx::postgres::PgPoolOptions;

use cli::AdminCommand;
use config::{Config, StoreKind};
use error::AdminError;

/// Opens the backend named by `config` and runs `command` against it.
#[tracing::instrument(skip(config, out), fields(store = ?config.store))]
pub async fn run<W: Write>(
    config: &Config,
    command: AdminCommand,
    out: &mut W,
) -> Result<(), AdminError> {
    let clock: SharedClock = Arc::new(SystemClock);

    match config.store {
        StoreKind::File => {
            tracing::debug!(data_dir = %config.data_dir.display(), "opening file store");
            let service = PlanetService::new(FileEventStore::new(&config.data_dir), clock);
            commands::execute(&service, command, out).await
        }
        StoreKind::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                AdminError::Config("DATABASE_URL is required when PLANETS_STORE=postgres".into())
            })?;
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(url)
                .await?;
            let store = PostgresEventStore::new(pool);
            store.ensure_schema().await?;

            let service = PlanetService::new(store, clock);
            commands::execute(&service, command, out).await
        }
    }
}
