//! `parkflow-events` — event-sourcing mechanics.
//!
//! Everything between the aggregate engine (`parkflow-core`) and concrete
//! storage: the event/envelope contracts, the checkpoint store contract, the
//! projection contract and registry, the checkpoint-aware projector, and the
//! notification subscription that feeds it.

pub mod checkpoint;
pub mod envelope;
pub mod event;
pub mod notifier;
pub mod projection;
pub mod projector;
pub mod subscription;

pub use checkpoint::{CheckpointStore, START_POSITION};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use notifier::{EnvelopeSink, InlineNotifier, NotificationSource};
pub use projection::{ApplyError, Projection, ProjectionRegistry, ProjectionStatus, RegistryError};
pub use projector::{ProjectError, ReadModelProjector};
pub use subscription::{NotificationReport, ReadModelSubscription, StreamFailure};
