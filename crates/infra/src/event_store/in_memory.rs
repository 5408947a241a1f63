use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::Utc;

use parkflow_core::{ExpectedVersion, StreamName};
use parkflow_events::EventEnvelope;

use super::{EventStore, EventStoreError, UncommittedEvent};

/// In-memory, thread-safe event store.
///
/// The reference backend: a map of stream name to its ordered envelope
/// history behind a single `RwLock`. Appends hold the write lock for the
/// whole check-then-append sequence, so a batch is atomic and two writers
/// racing on one stream serialize here.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamName, Vec<EventEnvelope>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct streams currently stored.
    pub fn stream_count(&self) -> usize {
        self.streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn validate_batch(events: &[UncommittedEvent]) -> Result<&StreamName, EventStoreError> {
        let first = &events[0];
        for event in events {
            if event.stream_name != first.stream_name {
                return Err(EventStoreError::InvalidAppend(format!(
                    "append batch spans streams '{}' and '{}'",
                    first.stream_name, event.stream_name
                )));
            }
            if event.entity_type != event.stream_name.entity_type() {
                return Err(EventStoreError::EntityTypeMismatch(format!(
                    "event entity type '{}' does not match stream '{}'",
                    event.entity_type, event.stream_name
                )));
            }
        }
        Ok(&first.stream_name)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let stream_name = Self::validate_batch(&events)?.clone();

        let mut streams = self
            .streams
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let current = streams
            .get(&stream_name)
            .and_then(|s| s.last())
            .map(EventEnvelope::version)
            .unwrap_or(0);
        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "stream '{stream_name}' is at version {current}, expected {expected_version:?}"
            )));
        }

        let stream = streams.entry(stream_name).or_default();

        let persisted_at = Utc::now();
        let mut committed = Vec::with_capacity(events.len());
        for (offset, event) in events.into_iter().enumerate() {
            let envelope = EventEnvelope::new(
                event.event_id,
                event.stream_name,
                event.entity_type,
                event.event_type,
                current + 1 + offset as u64,
                event.payload,
                persisted_at,
            );
            stream.push(envelope.clone());
            committed.push(envelope);
        }

        Ok(committed)
    }

    fn load_stream(&self, stream: &StreamName) -> Result<Vec<EventEnvelope>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(streams.get(stream).cloned().unwrap_or_default())
    }

    fn destroy_all(&self) -> Result<(), EventStoreError> {
        self.streams
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    fn stream() -> StreamName {
        StreamName::from_parts("car", "1").unwrap()
    }

    fn uncommitted(stream_name: &StreamName, event_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            stream_name: stream_name.clone(),
            entity_type: stream_name.entity_type().to_string(),
            event_type: event_type.to_string(),
            occurred_at: Utc::now(),
            payload: json!({ "event": event_type }),
        }
    }

    #[test]
    fn append_assigns_contiguous_versions_from_one() {
        let store = InMemoryEventStore::new();
        let committed = store
            .append(
                vec![
                    uncommitted(&stream(), "garage.car.created"),
                    uncommitted(&stream(), "garage.car.painted"),
                ],
                ExpectedVersion::Exact(0),
            )
            .unwrap();

        let versions: Vec<u64> = committed.iter().map(EventEnvelope::version).collect();
        assert_eq!(versions, vec![1, 2]);

        let more = store
            .append(
                vec![uncommitted(&stream(), "garage.car.tire_fitted")],
                ExpectedVersion::Exact(2),
            )
            .unwrap();
        assert_eq!(more[0].version(), 3);
    }

    #[test]
    fn stale_expected_version_is_a_concurrency_error() {
        let store = InMemoryEventStore::new();
        store
            .append(
                vec![uncommitted(&stream(), "garage.car.created")],
                ExpectedVersion::Exact(0),
            )
            .unwrap();

        let err = store
            .append(
                vec![uncommitted(&stream(), "garage.car.painted")],
                ExpectedVersion::Exact(0),
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));

        // The stream is untouched by the failed append.
        assert_eq!(store.load_stream(&stream()).unwrap().len(), 1);
    }

    #[test]
    fn expected_any_always_appends() {
        let store = InMemoryEventStore::new();
        store
            .append(
                vec![uncommitted(&stream(), "garage.car.created")],
                ExpectedVersion::Any,
            )
            .unwrap();
        let committed = store
            .append(
                vec![uncommitted(&stream(), "garage.car.painted")],
                ExpectedVersion::Any,
            )
            .unwrap();
        assert_eq!(committed[0].version(), 2);
    }

    #[test]
    fn batch_spanning_streams_is_rejected() {
        let store = InMemoryEventStore::new();
        let other = StreamName::from_parts("car", "2").unwrap();
        let err = store
            .append(
                vec![
                    uncommitted(&stream(), "garage.car.created"),
                    uncommitted(&other, "garage.car.created"),
                ],
                ExpectedVersion::Exact(0),
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidAppend(_)));
        assert_eq!(store.stream_count(), 0);
    }

    #[test]
    fn entity_type_must_match_the_stream() {
        let store = InMemoryEventStore::new();
        let mut event = uncommitted(&stream(), "garage.spot.created");
        event.entity_type = "spot".to_string();

        let err = store
            .append(vec![event], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::EntityTypeMismatch(_)));
    }

    #[test]
    fn load_unknown_stream_is_empty() {
        let store = InMemoryEventStore::new();
        assert!(store.load_stream(&stream()).unwrap().is_empty());
    }

    #[test]
    fn empty_append_is_a_no_op() {
        let store = InMemoryEventStore::new();
        let committed = store.append(Vec::new(), ExpectedVersion::Exact(0)).unwrap();
        assert!(committed.is_empty());
        assert_eq!(store.stream_count(), 0);
    }

    #[test]
    fn destroy_all_wipes_every_stream() {
        let store = InMemoryEventStore::new();
        store
            .append(
                vec![uncommitted(&stream(), "garage.car.created")],
                ExpectedVersion::Exact(0),
            )
            .unwrap();
        assert_eq!(store.stream_count(), 1);

        store.destroy_all().unwrap();
        assert_eq!(store.stream_count(), 0);
        assert!(store.load_stream(&stream()).unwrap().is_empty());
    }
}
