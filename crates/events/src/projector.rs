//! Checkpoint-aware read-model projector.
//!
//! Applies one stream's already-ordered envelope batch to its registered
//! projection, idempotently and all-or-nothing:
//!
//! - envelopes at or below the stream checkpoint are skipped (at-least-once
//!   redelivery is expected and harmless)
//! - a batch starting beyond `checkpoint + 1` is a gap and fails without
//!   touching the checkpoint
//! - the checkpoint advances only after the entire batch has applied; any
//!   failure leaves it untouched, so the next redelivery retries from the
//!   same point

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

use parkflow_core::StreamName;

use crate::checkpoint::CheckpointStore;
use crate::envelope::EventEnvelope;
use crate::projection::{ApplyError, ProjectionRegistry, ProjectionStatus};

/// Failure while projecting one stream's batch.
///
/// All variants are fatal for that stream's batch; none advances the
/// checkpoint. Other streams in the same notification are unaffected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectError {
    /// No projection is registered for the batch's entity type.
    #[error("no projection registered for entity type '{entity_type}'")]
    Configuration { entity_type: String },

    /// The batch is out of order relative to itself or to the checkpoint.
    #[error("ordering violation on stream '{stream}': {detail}")]
    Ordering { stream: StreamName, detail: String },

    /// An event payload could not be deserialized (unknown type tag or
    /// schema skew — data corruption territory, not retryable).
    #[error("failed to deserialize event '{event_type}' (v{version}) on stream '{stream}': {detail}")]
    Deserialization {
        stream: StreamName,
        event_type: String,
        version: u64,
        detail: String,
    },

    /// The projection recognized the entity type but reported the event as
    /// unhandled. Never treated as success.
    #[error("projection rejected event '{event_type}' (v{version}) on stream '{stream}'")]
    Rejected {
        stream: StreamName,
        event_type: String,
        version: u64,
    },
}

/// Idempotent, checkpoint-resumable per-stream event application.
pub struct ReadModelProjector<C: CheckpointStore> {
    registry: ProjectionRegistry,
    checkpoints: C,
    stream_locks: Mutex<HashMap<StreamName, Arc<Mutex<()>>>>,
}

impl<C: CheckpointStore> ReadModelProjector<C> {
    pub fn new(registry: ProjectionRegistry, checkpoints: C) -> Self {
        Self {
            registry,
            checkpoints,
            stream_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &ProjectionRegistry {
        &self.registry
    }

    pub fn checkpoints(&self) -> &C {
        &self.checkpoints
    }

    /// Lock handle for one stream name.
    ///
    /// The checkpoint load-then-save sequence is a check-then-act race if two
    /// deliveries for the same stream overlap; serializing per stream name
    /// excludes double-applying or skipping events.
    fn stream_lock(&self, stream: &StreamName) -> Arc<Mutex<()>> {
        let mut locks = self
            .stream_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(stream.clone()).or_default().clone()
    }

    /// Project one stream's batch of envelopes, sorted ascending by version.
    ///
    /// Returns the stream's checkpoint after the batch (unchanged if every
    /// envelope was an already-projected redelivery). The caller (normally the
    /// subscription) guarantees the batch is single-stream, sorted, and
    /// internally contiguous; foreign envelopes and post-skip gaps are still
    /// rejected here as ordering violations.
    pub fn project_batch(
        &self,
        stream: &StreamName,
        batch: &[EventEnvelope],
    ) -> Result<u64, ProjectError> {
        let Some(first) = batch.first() else {
            return Ok(self.checkpoints.load_checkpoint(stream));
        };

        let handler =
            self.registry
                .get(first.entity_type())
                .ok_or_else(|| ProjectError::Configuration {
                    entity_type: first.entity_type().to_string(),
                })?;

        let lock = self.stream_lock(stream);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let checkpoint = self.checkpoints.load_checkpoint(stream);
        if first.version() > checkpoint + 1 {
            return Err(ProjectError::Ordering {
                stream: stream.clone(),
                detail: format!(
                    "batch starts at v{} but last projected version is {checkpoint}",
                    first.version()
                ),
            });
        }

        let mut processed = 0u64;
        for envelope in batch {
            if envelope.stream_name() != stream {
                return Err(ProjectError::Ordering {
                    stream: stream.clone(),
                    detail: format!(
                        "batch contains envelope for foreign stream '{}'",
                        envelope.stream_name()
                    ),
                });
            }

            // Already projected on a previous delivery.
            if envelope.version() <= checkpoint {
                continue;
            }

            // `checkpoint + processed` is only the right advancement target if
            // the post-skip remainder is exactly contiguous; assert it rather
            // than trusting the caller's pre-skip check.
            let expected = checkpoint + processed + 1;
            if envelope.version() != expected {
                return Err(ProjectError::Ordering {
                    stream: stream.clone(),
                    detail: format!(
                        "expected v{expected} after skipping projected events, found v{}",
                        envelope.version()
                    ),
                });
            }

            match handler.project(envelope) {
                Ok(ProjectionStatus::Applied) => processed += 1,
                Ok(ProjectionStatus::Unhandled) => {
                    return Err(ProjectError::Rejected {
                        stream: stream.clone(),
                        event_type: envelope.event_type().to_string(),
                        version: envelope.version(),
                    });
                }
                Err(ApplyError::Deserialize(detail)) => {
                    return Err(ProjectError::Deserialization {
                        stream: stream.clone(),
                        event_type: envelope.event_type().to_string(),
                        version: envelope.version(),
                        detail,
                    });
                }
            }
        }

        let position = checkpoint + processed;
        if processed > 0 {
            self.checkpoints.save_checkpoint(stream, position);
            debug!(stream = %stream, position, processed, "checkpoint advanced");
        }
        Ok(position)
    }
}

impl<C: CheckpointStore> core::fmt::Debug for ReadModelProjector<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReadModelProjector")
            .field("registry", &self.registry)
            .finish()
    }
}
