use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AggregateId, Version};

/// The latest projection of one aggregate.
///
/// `version` counts how many of the aggregate's events (in log order) have
/// been folded into `state`. `last_occurred_on` is the newest `occurred_on`
/// among those events; anything older that shows up later forces a replay
/// from genesis rather than an incremental apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The aggregate this snapshot belongs to.
    pub aggregate_id: AggregateId,

    /// The type of aggregate (e.g., "Planet").
    pub aggregate_type: String,

    /// Number of events folded into the state.
    pub version: Version,

    /// High-water mark of the folded events.
    #[serde(default)]
    pub last_occurred_on: Option<DateTime<Utc>>,

    /// When the snapshot was written.
    pub timestamp: DateTime<Utc>,

    /// The serialized aggregate state.
    pub state: serde_json::Value,
}

impl Snapshot {
    /// Creates a snapshot from a serializable state.
    pub fn from_state<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        last_occurred_on: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            last_occurred_on,
            timestamp,
            state: serde_json::to_value(state)?,
        })
    }

    /// Deserializes the snapshot state into a concrete type.
    pub fn into_state<T: for<'de> Deserialize<'de>>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }

    /// Deserializes a copy of the state, leaving the snapshot intact.
    pub fn state_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.state)
    }
}
