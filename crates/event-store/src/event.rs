use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{AggregateId, EventStoreError};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Number of an aggregate's events folded into a projection.
///
/// A snapshot at version `n` covers the first `n` events of the aggregate
/// in log order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0): nothing folded yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns the number of events covered, clamping negatives to zero.
    pub fn as_count(&self) -> usize {
        usize::try_from(self.0).unwrap_or(0)
    }

    /// Version covering exactly `count` events.
    pub fn from_count(count: usize) -> Self {
        Self(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Position of an event within its aggregate-type stream.
///
/// Assigned by the store on append; strictly increasing in append order.
/// Breaks ties between events with equal timestamps during replay.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Position(i64);

impl Position {
    /// Creates a position from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Placeholder carried by envelopes that have not been appended yet.
    pub fn unassigned() -> Self {
        Self(0)
    }

    /// Returns the raw position value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event envelope containing a serialized domain event and its metadata.
///
/// The payload holds the variant-specific fields as a JSON object; the
/// `event_type` discriminator says which variant they belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// The discriminator of the event (e.g., "PlanetColonized").
    pub event_type: String,

    /// The aggregate this event belongs to.
    pub aggregate_id: AggregateId,

    /// The type of aggregate (e.g., "Planet"); names the stream.
    pub aggregate_type: String,

    /// Position in the stream, assigned on append.
    pub position: Position,

    /// When the fact happened.
    pub occurred_on: DateTime<Utc>,

    /// The variant payload fields.
    pub payload: Map<String, Value>,
}

impl EventEnvelope {
    /// Creates a new event envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Returns a copy of this envelope placed at `position`.
    pub fn at_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    occurred_on: Option<DateTime<Utc>>,
    payload: Option<Map<String, Value>>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the aggregate ID.
    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Sets the aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Sets when the event occurred.
    pub fn occurred_on(mut self, occurred_on: DateTime<Utc>) -> Self {
        self.occurred_on = Some(occurred_on);
        self
    }

    /// Sets the payload from a serializable value, which must serialize to
    /// a JSON object.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, EventStoreError> {
        match serde_json::to_value(payload)? {
            Value::Object(fields) => {
                self.payload = Some(fields);
                Ok(self)
            }
            other => Err(EventStoreError::InvalidEnvelope(format!(
                "payload must be a JSON object, got {other}"
            ))),
        }
    }

    /// Sets the payload from raw JSON fields.
    pub fn payload_raw(mut self, payload: Map<String, Value>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the event envelope.
    ///
    /// The position stays unassigned until the store appends the event.
    pub fn build(self) -> Result<EventEnvelope, EventStoreError> {
        let missing = |field: &str| EventStoreError::InvalidEnvelope(format!("{field} is required"));

        Ok(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self.event_type.ok_or_else(|| missing("event_type"))?,
            aggregate_id: self.aggregate_id.ok_or_else(|| missing("aggregate_id"))?,
            aggregate_type: self.aggregate_type.ok_or_else(|| missing("aggregate_type"))?,
            position: Position::unassigned(),
            occurred_on: self.occurred_on.ok_or_else(|| missing("occurred_on"))?,
            payload: self.payload.ok_or_else(|| missing("payload"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn event_id_new_creates_unique_ids() {
        let id1 = EventId::new();
        let id2 = EventId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn version_counts() {
        assert_eq!(Version::initial().as_count(), 0);
        assert_eq!(Version::initial().next(), Version::new(1));
        assert_eq!(Version::from_count(3), Version::new(3));
        assert_eq!(Version::new(-4).as_count(), 0);
    }

    #[test]
    fn position_ordering() {
        assert!(Position::new(1) < Position::new(2));
        assert_eq!(Position::unassigned().as_i64(), 0);
    }

    #[test]
    fn event_envelope_builder() {
        let aggregate_id = AggregateId::new();
        let occurred_on = Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap();

        let envelope = EventEnvelope::builder()
            .event_type("PlanetRenamed")
            .aggregate_id(aggregate_id)
            .aggregate_type("Planet")
            .occurred_on(occurred_on)
            .payload(&json!({"planetName": "Terra"}))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(envelope.event_type, "PlanetRenamed");
        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.aggregate_type, "Planet");
        assert_eq!(envelope.position, Position::unassigned());
        assert_eq!(envelope.occurred_on, occurred_on);
        assert_eq!(envelope.payload.get("planetName"), Some(&json!("Terra")));
    }

    #[test]
    fn builder_rejects_non_object_payload() {
        let result = EventEnvelope::builder().payload(&json!([1, 2, 3]));
        assert!(matches!(result, Err(EventStoreError::InvalidEnvelope(_))));
    }

    #[test]
    fn builder_reports_missing_fields() {
        let result = EventEnvelope::builder().event_type("PlanetRenamed").build();
        match result {
            Err(EventStoreError::InvalidEnvelope(message)) => {
                assert_eq!(message, "aggregate_id is required");
            }
            other => panic!("expected InvalidEnvelope, got {other:?}"),
        }
    }
}
