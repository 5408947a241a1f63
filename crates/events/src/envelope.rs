use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use parkflow_core::StreamName;

/// Envelope for a persisted event: the unit appended to a stream and carried
/// by change notifications.
///
/// Notes:
/// - **Append-only**: `version` is 1-based and forms an unbroken ascending
///   sequence within a stream.
/// - `payload` is the serialized, domain-agnostic event body; `event_type` is
///   the discriminator used to deserialize it back into a typed event.
/// - `persisted_at` is assigned by the event store at commit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    event_id: Uuid,
    stream_name: StreamName,
    entity_type: String,

    event_type: String,

    /// Monotonically increasing position in the stream, starting at 1.
    version: u64,

    payload: JsonValue,
    persisted_at: DateTime<Utc>,
}

impl EventEnvelope {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: Uuid,
        stream_name: StreamName,
        entity_type: impl Into<String>,
        event_type: impl Into<String>,
        version: u64,
        payload: JsonValue,
        persisted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            stream_name,
            entity_type: entity_type.into(),
            event_type: event_type.into(),
            version,
            payload,
            persisted_at,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn stream_name(&self) -> &StreamName {
        &self.stream_name
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn into_payload(self) -> JsonValue {
        self.payload
    }

    pub fn persisted_at(&self) -> DateTime<Utc> {
        self.persisted_at
    }
}
