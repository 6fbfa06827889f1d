//! Execution of admin commands against a planet service.
//!
//! Every command writes one JSON document per line to `out`.

use std::io::Write;

use common::AggregateId;
use domain::codec::decode;
use domain::{Aggregate, DomainError, Planet, PlanetEvent, PlanetService, Projection};
use event_store::{EventStore, SnapshotStore};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;

use crate::cli::AdminCommand;
use crate::error::AdminError;

/// Outcome of comparing one snapshot with its replayed history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    /// Snapshot matches a full replay.
    Ok,
    /// Snapshot lags or disagrees with the log; `rebuild` fixes it.
    Stale,
    /// History exists but no snapshot was written.
    Missing,
    /// The history itself cannot be replayed into a valid planet.
    Corrupt,
}

impl VerifyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyStatus::Ok => "ok",
            VerifyStatus::Stale => "stale",
            VerifyStatus::Missing => "missing",
            VerifyStatus::Corrupt => "corrupt",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    planet_id: AggregateId,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

fn write_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<(), AdminError> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Runs `command` against `service`, writing reports to `out`.
pub async fn execute<S, W>(
    service: &PlanetService<S>,
    command: AdminCommand,
    out: &mut W,
) -> Result<(), AdminError>
where
    S: EventStore + SnapshotStore + Clone,
    W: Write,
{
    match command {
        AdminCommand::List => {
            for planet in service.list_all_initial_states().await? {
                write_line(out, &planet)?;
            }
        }
        AdminCommand::Show { planet_id } => {
            write_line(out, &service.get_current_state(planet_id).await?)?;
        }
        AdminCommand::Initial { planet_id } => {
            write_line(out, &service.get_initial_state(planet_id).await?)?;
        }
        AdminCommand::History { planet_id } => history(service, planet_id, out).await?,
        AdminCommand::Verify => verify(service, out).await?,
        AdminCommand::Rebuild {
            planet_id,
            concurrency,
        } => rebuild(service, planet_id, concurrency, out).await?,
    }
    Ok(())
}

async fn history<S, W>(
    service: &PlanetService<S>,
    planet_id: AggregateId,
    out: &mut W,
) -> Result<(), AdminError>
where
    S: EventStore + SnapshotStore + Clone,
    W: Write,
{
    let envelopes = service
        .handler()
        .store()
        .get_events(Planet::aggregate_type(), planet_id)
        .await?;

    for envelope in &envelopes {
        decode::<PlanetEvent>(envelope).map_err(DomainError::from)?;
        write_line(out, envelope)?;
    }
    Ok(())
}

async fn compare_with_replay<S>(
    store: &S,
    planet_id: AggregateId,
) -> Result<VerifyStatus, DomainError>
where
    S: EventStore + SnapshotStore,
{
    let events = store.get_events(Planet::aggregate_type(), planet_id).await?;
    let replayed = Projection::<Planet>::replay(planet_id, &events)?;
    replayed.verify()?;

    let Some(snapshot) = store.get_snapshot(Planet::aggregate_type(), planet_id).await? else {
        return Ok(VerifyStatus::Missing);
    };
    let stored = Projection::<Planet>::from_snapshot(&snapshot)?;
    if stored.version == replayed.version && stored.state == replayed.state {
        Ok(VerifyStatus::Ok)
    } else {
        Ok(VerifyStatus::Stale)
    }
}

/// Replays one planet and compares the result with its snapshot.
pub async fn verify_planet<S>(store: &S, planet_id: AggregateId) -> (VerifyStatus, Option<String>)
where
    S: EventStore + SnapshotStore,
{
    match compare_with_replay(store, planet_id).await {
        Ok(status) => (status, None),
        Err(e) => (VerifyStatus::Corrupt, Some(e.to_string())),
    }
}

async fn verify<S, W>(service: &PlanetService<S>, out: &mut W) -> Result<(), AdminError>
where
    S: EventStore + SnapshotStore + Clone,
    W: Write,
{
    let store = service.handler().store();
    let mut problems = 0;

    for planet_id in store.aggregate_ids(Planet::aggregate_type()).await? {
        let (status, detail) = verify_planet(store, planet_id).await;
        if status != VerifyStatus::Ok {
            problems += 1;
            tracing::warn!(%planet_id, ?status, detail = detail.as_deref(), "verification failed");
        }
        write_line(
            out,
            &Report {
                planet_id,
                status: status.as_str(),
                detail,
            },
        )?;
    }

    if problems > 0 {
        return Err(AdminError::VerifyFailed { problems });
    }
    Ok(())
}

async fn rebuild<S, W>(
    service: &PlanetService<S>,
    planet_id: Option<AggregateId>,
    concurrency: usize,
    out: &mut W,
) -> Result<(), AdminError>
where
    S: EventStore + SnapshotStore + Clone,
    W: Write,
{
    let ids = match planet_id {
        Some(id) => vec![id],
        None => {
            service
                .handler()
                .store()
                .aggregate_ids(Planet::aggregate_type())
                .await?
        }
    };
    tracing::info!(planets = ids.len(), concurrency, "rebuilding snapshots");

    let results: Vec<(AggregateId, Result<Planet, DomainError>)> = stream::iter(ids)
        .map(|id| async move { (id, service.rebuild_snapshot(id).await) })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut failures = 0;
    for (planet_id, result) in results {
        let report = match result {
            Ok(_) => Report {
                planet_id,
                status: "rebuilt",
                detail: None,
            },
            Err(e) => {
                failures += 1;
                tracing::error!(%planet_id, error = %e, "snapshot rebuild failed");
                Report {
                    planet_id,
                    status: "failed",
                    detail: Some(e.to_string()),
                }
            }
        };
        write_line(out, &report)?;
    }

    if failures > 0 {
        return Err(AdminError::RebuildFailed { failures });
    }
    Ok(())
}
