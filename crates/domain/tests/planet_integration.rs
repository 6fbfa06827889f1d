//! Integration tests for the Planet aggregate.
//!
//! These tests drive the planet service end to end: commands, persistence,
//! snapshot refresh, out-of-order history and concurrent commands.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{AggregateId, Clock, FixedClock, ManualClock, PlayerId};
use domain::{
    ColonizePlanet, CreatePlanet, DomainError, DomainEvent, Planet, PlanetCreatedData,
    PlanetError, PlanetEvent, PlanetService, RenamePlanet,
};
use event_store::{
    EventStore, FileEventStore, InMemoryEventStore, SnapshotStore, Version,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap()
}

/// Helper to create a test planet service with a controllable clock.
fn create_service() -> (
    PlanetService<InMemoryEventStore>,
    InMemoryEventStore,
    Arc<ManualClock>,
) {
    let store = InMemoryEventStore::new();
    let clock = Arc::new(ManualClock::new(t0()));
    let service = PlanetService::new(store.clone(), clock.clone());
    (service, store, clock)
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn create_then_colonize() {
        let (service, _, clock) = create_service();
        let planet_id = AggregateId::new();
        let player_a = PlayerId::new();

        clock.set(t0() - Duration::minutes(10));
        service
            .create_planet(CreatePlanet::new(planet_id, "Earth"))
            .await
            .unwrap();

        clock.set(t0());
        service
            .colonize_planet(ColonizePlanet::new(planet_id, player_a))
            .await
            .unwrap();

        let planet = service.get_current_state(planet_id).await.unwrap();
        assert_eq!(planet.name(), "Earth");
        assert!(planet.is_colonized());
        assert_eq!(planet.colonized_by(), Some(player_a));
        assert_eq!(planet.colonized_at(), Some(t0()));
    }

    #[tokio::test]
    async fn backfilled_colonization_wins_when_earlier() {
        let (service, _, clock) = create_service();
        let planet_id = AggregateId::new();
        let player_a = PlayerId::new();
        let player_b = PlayerId::new();

        clock.set(t0() - Duration::minutes(10));
        service
            .create_planet(CreatePlanet::new(planet_id, "Earth"))
            .await
            .unwrap();
        clock.set(t0());
        service
            .colonize_planet(ColonizePlanet::new(planet_id, player_a))
            .await
            .unwrap();

        let backfill = PlanetEvent::colonized(
            planet_id,
            player_b,
            &FixedClock(t0() - Duration::minutes(1)),
        );
        let after_import = service.import_event(backfill).await.unwrap();

        assert_eq!(after_import.colonized_by(), Some(player_b));
        let planet = service.get_current_state(planet_id).await.unwrap();
        assert_eq!(planet.colonized_by(), Some(player_b));
        assert_eq!(planet.colonized_at(), Some(t0() - Duration::minutes(1)));
    }

    #[tokio::test]
    async fn backfill_is_seen_even_without_snapshot_refresh() {
        let (service, store, clock) = create_service();
        let planet_id = AggregateId::new();
        let player_a = PlayerId::new();
        let player_b = PlayerId::new();

        clock.set(t0() - Duration::minutes(10));
        service
            .create_planet(CreatePlanet::new(planet_id, "Earth"))
            .await
            .unwrap();
        clock.set(t0());
        service
            .colonize_planet(ColonizePlanet::new(planet_id, player_a))
            .await
            .unwrap();

        // Straight to the store: the snapshot still says A.
        let backfill = PlanetEvent::colonized(
            planet_id,
            player_b,
            &FixedClock(t0() - Duration::minutes(1)),
        );
        store
            .append(domain::codec::encode(&backfill, "Planet").unwrap())
            .await
            .unwrap();

        let initial = service.get_initial_state(planet_id).await.unwrap();
        assert_eq!(initial.colonized_by(), Some(player_a));

        let planet = service.get_current_state(planet_id).await.unwrap();
        assert_eq!(planet.colonized_by(), Some(player_b));
    }

    #[tokio::test]
    async fn rename_with_empty_name_changes_nothing() {
        let (service, _, _) = create_service();
        let planet_id = AggregateId::new();
        let player_a = PlayerId::new();

        service
            .create_planet(CreatePlanet::new(planet_id, "Earth"))
            .await
            .unwrap();
        service
            .colonize_planet(ColonizePlanet::new(planet_id, player_a))
            .await
            .unwrap();
        let before = service.events(planet_id).await.unwrap();

        let result = service
            .rename_planet(RenamePlanet::new(planet_id, "", player_a))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Planet(PlanetError::InvalidName))
        ));
        assert_eq!(service.events(planet_id).await.unwrap(), before);
        assert_eq!(
            service.get_current_state(planet_id).await.unwrap().name(),
            "Earth"
        );
    }

    #[tokio::test]
    async fn unknown_planet_is_not_found() {
        let (service, _, _) = create_service();
        let planet_id = AggregateId::new();

        assert!(matches!(
            service.get_current_state(planet_id).await,
            Err(DomainError::NotFound { aggregate_id, .. }) if aggregate_id == planet_id
        ));
        assert!(matches!(
            service
                .colonize_planet(ColonizePlanet::new(planet_id, PlayerId::new()))
                .await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn planet_created_colonized_keeps_its_colonizer() {
        let (service, _, _) = create_service();
        let planet_id = AggregateId::new();
        let founder = PlayerId::new();
        let at = t0() - Duration::days(1);

        service
            .create_planet(CreatePlanet::colonized(planet_id, "Mars", founder, at))
            .await
            .unwrap();

        let planet = service.get_current_state(planet_id).await.unwrap();
        assert_eq!(planet.colonized_by(), Some(founder));
        assert_eq!(planet.colonized_at(), Some(at));

        let renamed = service
            .rename_planet(RenamePlanet::new(planet_id, "Ares", founder))
            .await
            .unwrap();
        assert_eq!(renamed.name(), "Ares");
    }

    #[tokio::test]
    async fn imported_event_for_unknown_planet_seeds_blank_state() {
        let (service, _, _) = create_service();
        let planet_id = AggregateId::new();
        let player = PlayerId::new();

        let planet = service
            .import_event(PlanetEvent::colonized(planet_id, player, &FixedClock(t0())))
            .await
            .unwrap();

        assert_eq!(planet.name(), domain::BLANK_PLANET_NAME);
        assert_eq!(planet.colonized_by(), Some(player));
    }
}

mod error_handling {
    use super::*;

    #[tokio::test]
    async fn second_colonize_is_rejected_and_appends_nothing() {
        let (service, store, _) = create_service();
        let planet_id = AggregateId::new();

        service
            .create_planet(CreatePlanet::new(planet_id, "Earth"))
            .await
            .unwrap();
        service
            .colonize_planet(ColonizePlanet::new(planet_id, PlayerId::new()))
            .await
            .unwrap();

        let result = service
            .colonize_planet(ColonizePlanet::new(planet_id, PlayerId::new()))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Planet(PlanetError::AlreadyColonized))
        ));
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test]
    async fn rename_by_stranger_is_rejected_even_with_valid_name() {
        let (service, store, _) = create_service();
        let planet_id = AggregateId::new();

        service
            .create_planet(CreatePlanet::new(planet_id, "Earth"))
            .await
            .unwrap();
        service
            .colonize_planet(ColonizePlanet::new(planet_id, PlayerId::new()))
            .await
            .unwrap();

        let result = service
            .rename_planet(RenamePlanet::new(planet_id, "Terra", PlayerId::new()))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Planet(PlanetError::NotColonizer))
        ));
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test]
    async fn create_on_existing_history_conflicts() {
        let (service, _, _) = create_service();
        let planet_id = AggregateId::new();

        // History but no snapshot yet still counts as existing.
        service
            .import_event(PlanetEvent::renamed(planet_id, "Terra", &FixedClock(t0())))
            .await
            .unwrap();

        let result = service
            .create_planet(CreatePlanet::new(planet_id, "Earth"))
            .await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn imported_creation_cannot_reset_a_colonized_planet() {
        let (service, store, clock) = create_service();
        let planet_id = AggregateId::new();
        let player_a = PlayerId::new();
        let player_b = PlayerId::new();

        service
            .create_planet(CreatePlanet::new(planet_id, "Earth"))
            .await
            .unwrap();
        clock.set(t0() + Duration::minutes(1));
        service
            .colonize_planet(ColonizePlanet::new(planet_id, player_a))
            .await
            .unwrap();

        let recreated = PlanetEvent::created(
            planet_id,
            PlanetCreatedData {
                planet_name: "Earth2".to_string(),
                is_colonized: false,
                colonized_by: None,
                colonized_at: None,
            },
            &FixedClock(t0() + Duration::minutes(5)),
        );
        let result = service.import_event(recreated).await;

        assert!(matches!(result, Err(DomainError::Conflict { .. })));
        assert_eq!(store.event_count().await, 2);

        let planet = service.get_current_state(planet_id).await.unwrap();
        assert_eq!(planet.name(), "Earth");
        assert_eq!(planet.colonized_by(), Some(player_a));

        assert!(matches!(
            service
                .colonize_planet(ColonizePlanet::new(planet_id, player_b))
                .await,
            Err(DomainError::Planet(PlanetError::AlreadyColonized))
        ));
    }

    #[tokio::test]
    async fn imported_creation_for_new_planet_is_accepted() {
        let (service, _, _) = create_service();
        let planet_id = AggregateId::new();

        let created = PlanetEvent::created(
            planet_id,
            PlanetCreatedData {
                planet_name: "Vesta".to_string(),
                is_colonized: false,
                colonized_by: None,
                colonized_at: None,
            },
            &FixedClock(t0()),
        );
        let planet = service.import_event(created).await.unwrap();

        assert_eq!(planet.name(), "Vesta");
    }

    #[tokio::test]
    async fn unknown_event_type_in_log_is_a_serialization_error() {
        let (service, store, _) = create_service();
        let planet_id = AggregateId::new();

        service
            .create_planet(CreatePlanet::new(planet_id, "Earth"))
            .await
            .unwrap();

        let mut foreign = domain::codec::encode(
            &PlanetEvent::renamed(planet_id, "Terra", &FixedClock(t0() + Duration::hours(1))),
            "Planet",
        )
        .unwrap();
        foreign.event_type = "MineUpgraded".to_string();
        store.append(foreign).await.unwrap();

        assert!(matches!(
            service.get_current_state(planet_id).await,
            Err(DomainError::Serialization(_))
        ));
        assert!(matches!(
            service.events(planet_id).await,
            Err(DomainError::Serialization(_))
        ));
    }
}

mod concurrency {
    use futures_util::future::join_all;

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_colonizations_yield_one_winner() {
        let (service, store, _) = create_service();
        let service = Arc::new(service);
        let planet_id = AggregateId::new();

        service
            .create_planet(CreatePlanet::new(planet_id, "Earth"))
            .await
            .unwrap();

        let players: Vec<PlayerId> = (0..8).map(|_| PlayerId::new()).collect();
        let attempts = players.iter().map(|player| {
            let service = Arc::clone(&service);
            let player = *player;
            tokio::spawn(async move {
                service
                    .colonize_planet(ColonizePlanet::new(planet_id, player))
                    .await
            })
        });

        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let winners: Vec<&Planet> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results.iter().filter(|r| r.is_err()).all(|r| matches!(
            r,
            Err(DomainError::Planet(PlanetError::AlreadyColonized))
        )));

        assert_eq!(store.event_count().await, 2);
        let planet = service.get_current_state(planet_id).await.unwrap();
        assert_eq!(planet.colonized_by(), winners[0].colonized_by());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn different_planets_proceed_independently() {
        let (service, _, _) = create_service();
        let service = Arc::new(service);

        let tasks = (0..10).map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let planet_id = AggregateId::new();
                service
                    .create_planet(CreatePlanet::new(planet_id, format!("Planet {i}")))
                    .await
                    .unwrap();
                service
                    .colonize_planet(ColonizePlanet::new(planet_id, PlayerId::new()))
                    .await
            })
        });

        for result in join_all(tasks).await {
            assert!(result.unwrap().unwrap().is_colonized());
        }
        assert_eq!(service.list_all_initial_states().await.unwrap().len(), 10);
    }
}

mod file_backend {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn state_survives_restart() {
        let dir = TempDir::new().unwrap();
        let planet_id = AggregateId::new();
        let player = PlayerId::new();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(t0()));

        {
            let service = PlanetService::new(FileEventStore::new(dir.path()), clock.clone());
            service
                .create_planet(CreatePlanet::new(planet_id, "Earth"))
                .await
                .unwrap();
            service
                .colonize_planet(ColonizePlanet::new(planet_id, player))
                .await
                .unwrap();
            service
                .rename_planet(RenamePlanet::new(planet_id, "Terra", player))
                .await
                .unwrap();
        }

        let store = FileEventStore::new(dir.path());
        let service = PlanetService::new(store.clone(), clock);
        let planet = service.get_current_state(planet_id).await.unwrap();
        assert_eq!(planet.name(), "Terra");
        assert_eq!(planet.colonized_by(), Some(player));

        let events = service.events(planet_id).await.unwrap();
        let types: Vec<_> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["PlanetCreated", "PlanetColonized", "PlanetRenamed"]);

        let snapshot = store
            .get_snapshot("Planet", planet_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.version, Version::new(3));
    }
}
