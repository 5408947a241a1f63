//! Aggregate repository: load, save, notify.
//!
//! The repository is the only place where the aggregate engine touches the
//! event store. `load` rehydrates from the full stream history; `save`
//! appends the pending events under an optimistic-concurrency check and then
//! hands the committed envelopes to the notifier, in line with the caller.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use parkflow_core::{Aggregate, DomainError, EventSourced, ExpectedVersion, StreamName};
use parkflow_events::{Event, EventEnvelope, InlineNotifier};

use crate::event_store::{EventStore, EventStoreError, UncommittedEvent};

/// Repository operation error.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The stream moved between load and save. Callers retry by reloading.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("business rule violated: {0}")]
    BusinessRule(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    /// The persisted history violates the stream contract (gap, wrong entity
    /// type). This is corruption, not a domain failure.
    #[error("corrupt history for stream '{stream}': {detail}")]
    CorruptHistory { stream: StreamName, detail: String },

    #[error("failed to deserialize event '{event_type}' at version {version}: {detail}")]
    Deserialize {
        event_type: String,
        version: u64,
        detail: String,
    },

    #[error(transparent)]
    Store(EventStoreError),
}

impl From<DomainError> for RepositoryError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => RepositoryError::Validation(msg),
            DomainError::InvalidId(msg) => RepositoryError::Validation(msg),
            DomainError::BusinessRule(msg) => RepositoryError::BusinessRule(msg),
            DomainError::Conflict(msg) => RepositoryError::Concurrency(msg),
            DomainError::NotFound => RepositoryError::NotFound,
        }
    }
}

impl From<EventStoreError> for RepositoryError {
    fn from(err: EventStoreError) -> Self {
        match err {
            EventStoreError::Concurrency(msg) => RepositoryError::Concurrency(msg),
            other => RepositoryError::Store(other),
        }
    }
}

/// Event-sourced aggregate repository over any [`EventStore`].
pub struct AggregateRepository<S: EventStore> {
    store: S,
    notifier: Arc<InlineNotifier>,
}

impl<S: EventStore> AggregateRepository<S> {
    pub fn new(store: S, notifier: Arc<InlineNotifier>) -> Self {
        Self { store, notifier }
    }

    pub fn notifier(&self) -> &Arc<InlineNotifier> {
        &self.notifier
    }

    /// Rehydrate an aggregate from the full history of its stream.
    ///
    /// `seed` produces the empty pre-creation state the history is folded
    /// over. Fails with [`RepositoryError::NotFound`] when the stream has no
    /// events.
    pub fn load<A>(
        &self,
        stream: &StreamName,
        seed: impl FnOnce() -> A,
    ) -> Result<EventSourced<A>, RepositoryError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        if stream.entity_type() != A::ENTITY_TYPE {
            return Err(RepositoryError::Validation(format!(
                "stream '{stream}' does not hold '{}' aggregates",
                A::ENTITY_TYPE
            )));
        }

        let history = self.store.load_stream(stream)?;
        if history.is_empty() {
            return Err(RepositoryError::NotFound);
        }

        let mut events = Vec::with_capacity(history.len());
        for (index, envelope) in history.into_iter().enumerate() {
            let expected = index as u64 + 1;
            if envelope.version() != expected {
                return Err(RepositoryError::CorruptHistory {
                    stream: stream.clone(),
                    detail: format!(
                        "expected version {expected}, found {}",
                        envelope.version()
                    ),
                });
            }

            let event_type = envelope.event_type().to_string();
            let version = envelope.version();
            let event: A::Event =
                serde_json::from_value(envelope.into_payload()).map_err(|e| {
                    RepositoryError::Deserialize {
                        event_type,
                        version,
                        detail: e.to_string(),
                    }
                })?;
            events.push(event);
        }

        Ok(EventSourced::rehydrate(seed(), events))
    }

    /// Persist an aggregate's pending events and notify subscribers.
    ///
    /// Checks invariants first, appends with the aggregate's committed
    /// version as the concurrency expectation, and only then publishes the
    /// committed envelopes. A concurrency conflict leaves the aggregate's
    /// pending events intact so the caller can reload and retry.
    pub fn save<A>(
        &self,
        root: &mut EventSourced<A>,
    ) -> Result<Vec<EventEnvelope>, RepositoryError>
    where
        A: Aggregate,
        A::Event: Event + Serialize,
    {
        root.ensure_valid_state()?;

        if !root.has_pending() {
            return Ok(Vec::new());
        }

        let stream = root.stream_name()?;
        let expected = ExpectedVersion::Exact(root.committed_version());

        let mut batch = Vec::with_capacity(root.pending_events().len());
        for event in root.pending_events() {
            batch.push(UncommittedEvent::from_typed(
                stream.clone(),
                A::ENTITY_TYPE,
                Uuid::now_v7(),
                event,
            )?);
        }

        let committed = self.store.append(batch, expected)?;
        root.mark_committed();

        debug!(
            stream = %stream,
            events = committed.len(),
            version = root.version(),
            "aggregate saved"
        );

        self.notifier.publish(&committed);
        Ok(committed)
    }

    /// Wipe the underlying store. Operational/test utility only.
    pub fn destroy_all(&self) -> Result<(), RepositoryError> {
        self.store.destroy_all()?;
        Ok(())
    }
}
