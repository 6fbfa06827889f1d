//! Planet aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, Clock, PlayerId};
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, DomainEvent};

use super::{
    PlanetError, PlanetEvent, PlanetEventKind,
    events::{PlanetColonizedData, PlanetCreatedData},
};

/// Name given to a planet whose history does not start with its creation.
pub const BLANK_PLANET_NAME: &str = "New Planet";

/// Planet aggregate root.
///
/// The serialized form is the snapshot record
/// `{id, name, isColonized, colonizedBy, colonizedAt}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Planet {
    id: AggregateId,
    name: String,
    is_colonized: bool,
    #[serde(default)]
    colonized_by: Option<PlayerId>,
    #[serde(default)]
    colonized_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    uncommitted: Vec<PlanetEvent>,
}

impl PartialEq for Planet {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.is_colonized == other.is_colonized
            && self.colonized_by == other.colonized_by
            && self.colonized_at == other.colonized_at
    }
}

impl Eq for Planet {}

impl Aggregate for Planet {
    type Event = PlanetEvent;
    type Error = PlanetError;

    fn aggregate_type() -> &'static str {
        "Planet"
    }

    fn blank(id: AggregateId) -> Self {
        Self {
            id,
            name: BLANK_PLANET_NAME.to_string(),
            is_colonized: false,
            colonized_by: None,
            colonized_at: None,
            uncommitted: Vec::new(),
        }
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn apply(&mut self, event: &PlanetEvent) {
        if event.entity_id() != self.id {
            tracing::warn!(
                planet_id = %self.id,
                event_id = %event.event_id(),
                event_entity_id = %event.entity_id(),
                event_type = event.event_type(),
                "ignoring event addressed to another planet"
            );
            return;
        }

        match event.kind() {
            PlanetEventKind::Created(data) => self.apply_created(data),
            PlanetEventKind::Colonized(data) => self.apply_colonized(event, data),
            PlanetEventKind::Renamed(data) => {
                self.name = data.planet_name.clone();
            }
        }
    }

    fn uncommitted_events(&self) -> &[PlanetEvent] {
        &self.uncommitted
    }

    fn take_uncommitted_events(&mut self) -> Vec<PlanetEvent> {
        std::mem::take(&mut self.uncommitted)
    }

    fn check_invariants(&self) -> Result<(), String> {
        check_colonization(self.is_colonized, self.colonized_by, self.colonized_at)
    }
}

/// Colonization flag and its two companion fields must agree.
fn check_colonization(
    is_colonized: bool,
    colonized_by: Option<PlayerId>,
    colonized_at: Option<DateTime<Utc>>,
) -> Result<(), String> {
    match (is_colonized, colonized_by, colonized_at) {
        (true, Some(_), Some(_)) | (false, None, None) => Ok(()),
        (true, _, _) => Err("colonized planet needs both colonizedBy and colonizedAt".to_string()),
        (false, _, _) => {
            Err("uncolonized planet must not have colonizedBy or colonizedAt".to_string())
        }
    }
}

// Query methods
impl Planet {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_colonized(&self) -> bool {
        self.is_colonized
    }

    pub fn colonized_by(&self) -> Option<PlayerId> {
        self.colonized_by
    }

    pub fn colonized_at(&self) -> Option<DateTime<Utc>> {
        self.colonized_at
    }
}

// Command methods (validate, then record and apply one event)
impl Planet {
    /// Creates a new planet, buffering its `PlanetCreated` event.
    pub fn create(
        id: AggregateId,
        name: impl Into<String>,
        is_colonized: bool,
        colonized_by: Option<PlayerId>,
        colonized_at: Option<DateTime<Utc>>,
        clock: &dyn Clock,
    ) -> Result<Self, PlanetError> {
        check_colonization(is_colonized, colonized_by, colonized_at)
            .map_err(PlanetError::InvalidState)?;

        let mut planet = Self::blank(id);
        let event = PlanetEvent::created(
            id,
            PlanetCreatedData {
                planet_name: name.into(),
                is_colonized,
                colonized_by,
                colonized_at,
            },
            clock,
        );
        planet.record(event);
        Ok(planet)
    }

    /// Colonizes the planet on behalf of `player_id`.
    pub fn colonize(&mut self, player_id: PlayerId, clock: &dyn Clock) -> Result<(), PlanetError> {
        if self.is_colonized {
            return Err(PlanetError::AlreadyColonized);
        }

        self.record(PlanetEvent::colonized(self.id, player_id, clock));
        Ok(())
    }

    /// Renames the planet. Only its colonizer may do so.
    pub fn rename(
        &mut self,
        new_name: impl Into<String>,
        requesting_player: PlayerId,
        clock: &dyn Clock,
    ) -> Result<(), PlanetError> {
        if !self.is_colonized || self.colonized_by != Some(requesting_player) {
            return Err(PlanetError::NotColonizer);
        }

        let new_name = new_name.into();
        if new_name.is_empty() {
            return Err(PlanetError::InvalidName);
        }

        self.record(PlanetEvent::renamed(self.id, new_name, clock));
        Ok(())
    }

    fn record(&mut self, event: PlanetEvent) {
        self.apply(&event);
        self.uncommitted.push(event);
    }
}

// Apply event helpers
impl Planet {
    fn apply_created(&mut self, data: &PlanetCreatedData) {
        self.name = data.planet_name.clone();
        self.is_colonized = data.is_colonized;
        self.colonized_by = data.colonized_by;
        self.colonized_at = data.colonized_at;
    }

    fn apply_colonized(&mut self, event: &PlanetEvent, data: &PlanetColonizedData) {
        if self.is_colonized {
            tracing::warn!(
                planet_id = %self.id,
                event_id = %event.event_id(),
                colonized_by = ?self.colonized_by,
                ignored_player = %data.player_id,
                "planet already colonized, later colonization ignored"
            );
            return;
        }

        self.is_colonized = true;
        self.colonized_by = Some(data.player_id);
        self.colonized_at = Some(event.occurred_on());
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use common::FixedClock;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap()
    }

    fn earth(clock: &dyn Clock) -> Planet {
        Planet::create(AggregateId::new(), "Earth", false, None, None, clock).unwrap()
    }

    #[test]
    fn create_buffers_one_event() {
        let clock = FixedClock(t0());
        let planet = earth(&clock);

        assert_eq!(planet.name(), "Earth");
        assert!(!planet.is_colonized());
        assert_eq!(planet.uncommitted_events().len(), 1);
        assert_eq!(planet.uncommitted_events()[0].event_type(), "PlanetCreated");
        assert_eq!(planet.uncommitted_events()[0].occurred_on(), t0());
    }

    #[test]
    fn create_rejects_half_colonized_state() {
        let clock = FixedClock(t0());
        let id = AggregateId::new();

        let missing_at = Planet::create(id, "Mars", true, Some(PlayerId::new()), None, &clock);
        assert!(matches!(missing_at, Err(PlanetError::InvalidState(_))));

        let stray_by = Planet::create(id, "Mars", false, Some(PlayerId::new()), None, &clock);
        assert!(matches!(stray_by, Err(PlanetError::InvalidState(_))));

        let colonized =
            Planet::create(id, "Mars", true, Some(PlayerId::new()), Some(t0()), &clock).unwrap();
        assert!(colonized.is_colonized());
        assert!(colonized.check_invariants().is_ok());
    }

    #[test]
    fn colonize_sets_colonizer_and_time() {
        let clock = FixedClock(t0());
        let mut planet = earth(&clock);
        let player = PlayerId::new();

        planet.colonize(player, &clock).unwrap();

        assert!(planet.is_colonized());
        assert_eq!(planet.colonized_by(), Some(player));
        assert_eq!(planet.colonized_at(), Some(t0()));
        assert_eq!(planet.uncommitted_events().len(), 2);
    }

    #[test]
    fn second_colonize_is_rejected_without_event() {
        let clock = FixedClock(t0());
        let mut planet = earth(&clock);
        planet.colonize(PlayerId::new(), &clock).unwrap();

        let result = planet.colonize(PlayerId::new(), &clock);

        assert_eq!(result, Err(PlanetError::AlreadyColonized));
        assert_eq!(planet.uncommitted_events().len(), 2);
    }

    #[test]
    fn rename_by_colonizer() {
        let clock = FixedClock(t0());
        let mut planet = earth(&clock);
        let player = PlayerId::new();
        planet.colonize(player, &clock).unwrap();

        planet.rename("Terra", player, &clock).unwrap();

        assert_eq!(planet.name(), "Terra");
    }

    #[test]
    fn rename_checks_colonizer_before_name() {
        let clock = FixedClock(t0());
        let mut planet = earth(&clock);
        let player = PlayerId::new();

        assert_eq!(
            planet.rename("", player, &clock),
            Err(PlanetError::NotColonizer)
        );

        planet.colonize(player, &clock).unwrap();
        assert_eq!(
            planet.rename("Terra", PlayerId::new(), &clock),
            Err(PlanetError::NotColonizer)
        );
        assert_eq!(
            planet.rename("", player, &clock),
            Err(PlanetError::InvalidName)
        );
        assert_eq!(planet.name(), "Earth");
    }

    #[test]
    fn earlier_colonization_stands_when_replayed_later() {
        let id = AggregateId::new();
        let first = PlayerId::new();
        let second = PlayerId::new();
        let mut planet = Planet::blank(id);

        planet.apply(&PlanetEvent::colonized(id, first, &FixedClock(t0())));
        planet.apply(&PlanetEvent::colonized(
            id,
            second,
            &FixedClock(t0() + Duration::minutes(1)),
        ));

        assert_eq!(planet.colonized_by(), Some(first));
        assert_eq!(planet.colonized_at(), Some(t0()));
    }

    #[test]
    fn events_for_other_planets_are_ignored() {
        let mut planet = Planet::blank(AggregateId::new());
        planet.apply(&PlanetEvent::renamed(
            AggregateId::new(),
            "Elsewhere",
            &FixedClock(t0()),
        ));
        assert_eq!(planet.name(), BLANK_PLANET_NAME);
    }

    #[test]
    fn snapshot_record_skips_buffer() {
        let clock = FixedClock(t0());
        let planet = earth(&clock);

        let json = serde_json::to_value(&planet).unwrap();
        assert_eq!(json["name"], "Earth");
        assert_eq!(json["isColonized"], false);
        assert!(json.get("uncommitted").is_none());

        let restored: Planet = serde_json::from_value(json).unwrap();
        assert_eq!(restored, planet);
        assert!(restored.uncommitted_events().is_empty());
    }

    #[test]
    fn take_uncommitted_drains_buffer() {
        let clock = FixedClock(t0());
        let mut planet = earth(&clock);
        assert_eq!(planet.take_uncommitted_events().len(), 1);
        assert!(planet.uncommitted_events().is_empty());
    }

    #[test]
    fn invariant_check_reports_inconsistent_projection() {
        let json = serde_json::json!({
            "id": AggregateId::new(),
            "name": "Broken",
            "isColonized": true,
            "colonizedBy": null,
            "colonizedAt": null
        });
        let planet: Planet = serde_json::from_value(json).unwrap();
        assert!(planet.check_invariants().is_err());
    }
}
