//! Translation between typed domain events and stored envelopes.
//!
//! Each event type owns an explicit decode table: the discriminator picks the
//! variant, and a discriminator with no entry is an error rather than a
//! silently skipped record.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventEnvelope, EventId};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::aggregate::DomainEvent;

/// Errors raised while encoding or decoding events and snapshots.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The discriminator has no entry in the decode table.
    #[error("Unknown event type `{event_type}` in {aggregate_type} stream")]
    UnknownEventType {
        aggregate_type: &'static str,
        event_type: String,
    },

    /// The payload does not match the shape of its variant.
    #[error("Malformed `{event_type}` payload: {source}")]
    MalformedPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot state does not deserialize into the aggregate.
    #[error("Malformed {aggregate_type} snapshot: {source}")]
    MalformedSnapshot {
        aggregate_type: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized.
    #[error("Encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Header fields every stored event carries next to its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub id: EventId,
    pub entity_id: AggregateId,
    pub occurred_on: DateTime<Utc>,
}

impl EventHeader {
    /// Extracts the header of a stored envelope.
    pub fn of(envelope: &EventEnvelope) -> Self {
        Self {
            id: envelope.event_id,
            entity_id: envelope.aggregate_id,
            occurred_on: envelope.occurred_on,
        }
    }
}

/// Serialization point of a closed family of events.
pub trait EventCodec: DomainEvent + Sized {
    /// Serializes the variant-specific fields.
    fn encode_payload(&self) -> Result<Map<String, Value>, CodecError>;

    /// Rebuilds an event from its header, discriminator and payload.
    fn decode_parts(
        header: EventHeader,
        event_type: &str,
        payload: Map<String, Value>,
    ) -> Result<Self, CodecError>;
}

/// Encodes an event into an envelope for the `aggregate_type` stream.
pub fn encode<E: EventCodec>(event: &E, aggregate_type: &str) -> Result<EventEnvelope, CodecError> {
    Ok(EventEnvelope {
        event_id: event.event_id(),
        event_type: event.event_type().to_string(),
        aggregate_id: event.entity_id(),
        aggregate_type: aggregate_type.to_string(),
        position: event_store::Position::unassigned(),
        occurred_on: event.occurred_on(),
        payload: event.encode_payload()?,
    })
}

/// Decodes a stored envelope through the event type's decode table.
pub fn decode<E: EventCodec>(envelope: &EventEnvelope) -> Result<E, CodecError> {
    E::decode_parts(
        EventHeader::of(envelope),
        &envelope.event_type,
        envelope.payload.clone(),
    )
}

/// Deserializes one variant's payload, tagging failures with the discriminator.
pub fn payload_as<T: DeserializeOwned>(
    event_type: &str,
    payload: Map<String, Value>,
) -> Result<T, CodecError> {
    serde_json::from_value(Value::Object(payload)).map_err(|source| CodecError::MalformedPayload {
        event_type: event_type.to_string(),
        source,
    })
}

/// Serializes a payload struct, which must produce a JSON object.
pub fn payload_of<T: serde::Serialize>(data: &T) -> Result<Map<String, Value>, CodecError> {
    match serde_json::to_value(data)? {
        Value::Object(fields) => Ok(fields),
        other => Err(CodecError::Encode(serde::ser::Error::custom(format!(
            "payload must be a JSON object, got {other}"
        )))),
    }
}
