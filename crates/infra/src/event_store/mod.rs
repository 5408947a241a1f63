//! Append-only event store boundary.
//!
//! Defines the infrastructure-facing abstraction for storing and loading
//! event streams without making storage assumptions. The bundled in-memory
//! implementation is the reference backend; a SQL or document backend only
//! has to honor the same contract.

pub mod in_memory;

pub use in_memory::InMemoryEventStore;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use parkflow_core::{ExpectedVersion, StreamName};
use parkflow_events::{Event, EventEnvelope};

/// An event ready to be appended to a stream (not yet assigned a version).
///
/// The event store assigns stream versions and the persistence timestamp
/// during append; until then the event only carries its identity, stream
/// metadata, type tag, and serialized payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub stream_name: StreamName,
    pub entity_type: String,

    pub event_type: String,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl UncommittedEvent {
    /// Build an uncommitted event from a typed domain event.
    ///
    /// Serializes the event to JSON and captures the type tag needed to
    /// deserialize it again on replay and projection.
    pub fn from_typed<E>(
        stream_name: StreamName,
        entity_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            stream_name,
            entity_type: entity_type.into(),
            event_type: event.event_type().to_string(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}

/// Event store operation error.
///
/// Infrastructure failures only (storage, concurrency, stream integrity);
/// domain failures are raised before the store is ever called.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Optimistic concurrency check failed; surfaced to the caller, never
    /// retried internally.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("entity type mismatch: {0}")]
    EntityTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// Append-only, stream-scoped event store.
///
/// Events are organized into streams, one stream per aggregate instance.
/// Within a stream, versions are assigned by the store and form an unbroken
/// ascending sequence starting at 1.
///
/// Implementations must:
/// - enforce optimistic concurrency against the current stream version
/// - assign contiguous versions starting at `current + 1`
/// - persist a batch atomically (all events or none)
/// - keep a stream's entity type stable across appends
pub trait EventStore: Send + Sync {
    /// Append a single-stream batch of events.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<EventEnvelope>, EventStoreError>;

    /// Load the full, ordered history of one stream (empty if unknown).
    fn load_stream(&self, stream: &StreamName) -> Result<Vec<EventEnvelope>, EventStoreError>;

    /// Wipe every stream. Operational/test utility only.
    fn destroy_all(&self) -> Result<(), EventStoreError>;
}

impl<S> EventStore for std::sync::Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, stream: &StreamName) -> Result<Vec<EventEnvelope>, EventStoreError> {
        (**self).load_stream(stream)
    }

    fn destroy_all(&self) -> Result<(), EventStoreError> {
        (**self).destroy_all()
    }
}
