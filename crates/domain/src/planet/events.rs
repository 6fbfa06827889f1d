//! Planet domain events.

use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use common::{AggregateId, Clock, PlayerId};
use event_store::EventId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::aggregate::DomainEvent;
use crate::codec::{CodecError, EventCodec, EventHeader, payload_as, payload_of};

pub const PLANET_CREATED: &str = "PlanetCreated";
pub const PLANET_COLONIZED: &str = "PlanetColonized";
pub const PLANET_RENAMED: &str = "PlanetRenamed";

/// An immutable fact about one planet.
///
/// `id` and `occurred_on` are fixed at construction. Two events are equal
/// when their ids are equal, whatever their payloads.
#[derive(Debug, Clone)]
pub struct PlanetEvent {
    id: EventId,
    entity_id: AggregateId,
    occurred_on: DateTime<Utc>,
    kind: PlanetEventKind,
}

/// The variant-specific part of a planet event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanetEventKind {
    /// The planet came into existence.
    Created(PlanetCreatedData),

    /// A player colonized the planet.
    Colonized(PlanetColonizedData),

    /// The planet got a new name.
    Renamed(PlanetRenamedData),
}

/// Data for PlanetCreated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanetCreatedData {
    pub planet_name: String,
    pub is_colonized: bool,
    #[serde(default)]
    pub colonized_by: Option<PlayerId>,
    #[serde(default)]
    pub colonized_at: Option<DateTime<Utc>>,
}

/// Data for PlanetColonized event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanetColonizedData {
    pub player_id: PlayerId,
    pub colonized_at: DateTime<Utc>,
}

/// Data for PlanetRenamed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanetRenamedData {
    pub planet_name: String,
}

impl PlanetEvent {
    /// Assembles an event from already-known header fields.
    ///
    /// Used when importing events produced elsewhere; commands go through
    /// the clock-based constructors instead.
    pub fn from_parts(
        id: EventId,
        entity_id: AggregateId,
        occurred_on: DateTime<Utc>,
        kind: PlanetEventKind,
    ) -> Self {
        Self {
            id,
            entity_id,
            occurred_on,
            kind,
        }
    }

    fn now(entity_id: AggregateId, clock: &dyn Clock, kind: PlanetEventKind) -> Self {
        Self::from_parts(EventId::new(), entity_id, clock.now(), kind)
    }

    pub fn created(entity_id: AggregateId, data: PlanetCreatedData, clock: &dyn Clock) -> Self {
        Self::now(entity_id, clock, PlanetEventKind::Created(data))
    }

    /// `colonized_at` is the construction instant.
    pub fn colonized(entity_id: AggregateId, player_id: PlayerId, clock: &dyn Clock) -> Self {
        let occurred_on = clock.now();
        Self::from_parts(
            EventId::new(),
            entity_id,
            occurred_on,
            PlanetEventKind::Colonized(PlanetColonizedData {
                player_id,
                colonized_at: occurred_on,
            }),
        )
    }

    pub fn renamed(
        entity_id: AggregateId,
        planet_name: impl Into<String>,
        clock: &dyn Clock,
    ) -> Self {
        Self::now(
            entity_id,
            clock,
            PlanetEventKind::Renamed(PlanetRenamedData {
                planet_name: planet_name.into(),
            }),
        )
    }

    pub fn kind(&self) -> &PlanetEventKind {
        &self.kind
    }
}

impl PartialEq for PlanetEvent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PlanetEvent {}

impl Hash for PlanetEvent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl DomainEvent for PlanetEvent {
    fn event_type(&self) -> &'static str {
        match self.kind {
            PlanetEventKind::Created(_) => PLANET_CREATED,
            PlanetEventKind::Colonized(_) => PLANET_COLONIZED,
            PlanetEventKind::Renamed(_) => PLANET_RENAMED,
        }
    }

    fn event_id(&self) -> EventId {
        self.id
    }

    fn entity_id(&self) -> AggregateId {
        self.entity_id
    }

    fn occurred_on(&self) -> DateTime<Utc> {
        self.occurred_on
    }

    fn is_creation(&self) -> bool {
        matches!(self.kind, PlanetEventKind::Created(_))
    }
}

impl EventCodec for PlanetEvent {
    fn encode_payload(&self) -> Result<Map<String, Value>, CodecError> {
        match &self.kind {
            PlanetEventKind::Created(data) => payload_of(data),
            PlanetEventKind::Colonized(data) => payload_of(data),
            PlanetEventKind::Renamed(data) => payload_of(data),
        }
    }

    fn decode_parts(
        header: EventHeader,
        event_type: &str,
        payload: Map<String, Value>,
    ) -> Result<Self, CodecError> {
        let kind = match event_type {
            PLANET_CREATED => PlanetEventKind::Created(payload_as(event_type, payload)?),
            PLANET_COLONIZED => PlanetEventKind::Colonized(payload_as(event_type, payload)?),
            PLANET_RENAMED => PlanetEventKind::Renamed(payload_as(event_type, payload)?),
            other => {
                return Err(CodecError::UnknownEventType {
                    aggregate_type: "Planet",
                    event_type: other.to_string(),
                });
            }
        };

        Ok(Self::from_parts(
            header.id,
            header.entity_id,
            header.occurred_on,
            kind,
        ))
    }
}
