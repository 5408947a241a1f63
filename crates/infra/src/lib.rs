//! Infrastructure layer: reference backends and wiring.
//!
//! In-memory implementations of the storage boundaries (event store,
//! checkpoint store, read-model stores), the aggregate repository that drives
//! the save/notify pipeline, the garage read-model projections, and telemetry
//! setup. Everything here is swappable: the contracts live in
//! `parkflow-core`/`parkflow-events`.

pub mod checkpoint_store;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod repository;
pub mod telemetry;


pub use checkpoint_store::InMemoryCheckpointStore;
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, UncommittedEvent};
pub use read_model::{InMemoryReadModelStore, ReadModelStore};
pub use repository::{AggregateRepository, RepositoryError};
