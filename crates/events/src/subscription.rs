//! Read-model subscription.
//!
//! Sits between the change-notification sources and the projector: a raw
//! notification batch may interleave envelopes from unrelated streams in no
//! particular order. The subscription groups the batch per stream, sorts and
//! validates each group, and forwards valid groups to the projector — one
//! stream's failure never blocks the others.
//!
//! The subscription is an owned component with an explicit lifecycle
//! (`start`/`stop`), not a module-level handle: the composition root builds
//! it, wires it to its sources, and keeps it alive for as long as the read
//! side should run.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error};

use parkflow_core::StreamName;

use crate::checkpoint::CheckpointStore;
use crate::envelope::EventEnvelope;
use crate::notifier::{EnvelopeSink, NotificationSource};
use crate::projector::{ProjectError, ReadModelProjector};

/// One stream's failure inside a notification batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFailure {
    pub stream: StreamName,
    pub error: ProjectError,
}

/// Outcome of one notification batch: which streams completed (with their new
/// checkpoint) and which failed. Every group is attempted before the report
/// is returned.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotificationReport {
    pub completed: Vec<(StreamName, u64)>,
    pub failures: Vec<StreamFailure>,
}

impl NotificationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Subscribes to notification sources and drives the projector.
pub struct ReadModelSubscription<C: CheckpointStore> {
    projector: ReadModelProjector<C>,
    sources: Vec<Arc<dyn NotificationSource>>,
    started: Mutex<bool>,
}

impl<C> ReadModelSubscription<C>
where
    C: CheckpointStore + 'static,
{
    pub fn new(
        projector: ReadModelProjector<C>,
        sources: Vec<Arc<dyn NotificationSource>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            projector,
            sources,
            started: Mutex::new(false),
        })
    }

    pub fn projector(&self) -> &ReadModelProjector<C> {
        &self.projector
    }

    /// Attach to every notification source. No-op if already started.
    pub fn start(self: &Arc<Self>) {
        let mut started = self.started.lock().unwrap_or_else(PoisonError::into_inner);
        if *started {
            return;
        }
        let sink: Arc<dyn EnvelopeSink> = self.clone();
        for source in &self.sources {
            source.attach(sink.clone());
        }
        *started = true;
    }

    /// Detach from every notification source. No-op if not started.
    pub fn stop(self: &Arc<Self>) {
        let mut started = self.started.lock().unwrap_or_else(PoisonError::into_inner);
        if !*started {
            return;
        }
        let sink: Arc<dyn EnvelopeSink> = self.clone();
        for source in &self.sources {
            source.detach(&sink);
        }
        *started = false;
    }

    pub fn is_started(&self) -> bool {
        *self.started.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Process one raw notification batch.
    ///
    /// Groups by stream, sorts each group by version, validates that the
    /// group is internally contiguous (no gaps, no duplicates — wherever the
    /// group happens to begin), then hands each valid group to the projector.
    /// Failures are collected per stream and logged after every group has
    /// been attempted.
    pub fn handle_notification(&self, batch: &[EventEnvelope]) -> NotificationReport {
        let mut groups: BTreeMap<StreamName, Vec<EventEnvelope>> = BTreeMap::new();
        for envelope in batch {
            groups
                .entry(envelope.stream_name().clone())
                .or_default()
                .push(envelope.clone());
        }

        let mut report = NotificationReport::default();
        for (stream, mut group) in groups {
            group.sort_by_key(EventEnvelope::version);

            if let Err(detail) = verify_contiguous(&group) {
                report.failures.push(StreamFailure {
                    error: ProjectError::Ordering {
                        stream: stream.clone(),
                        detail,
                    },
                    stream,
                });
                continue;
            }

            match self.projector.project_batch(&stream, &group) {
                Ok(position) => report.completed.push((stream, position)),
                Err(error) => report.failures.push(StreamFailure { stream, error }),
            }
        }

        for failure in &report.failures {
            error!(
                stream = %failure.stream,
                error = %failure.error,
                "read-model projection failed for stream"
            );
        }
        if !report.completed.is_empty() {
            debug!(
                streams = report.completed.len(),
                failures = report.failures.len(),
                "notification batch projected"
            );
        }

        report
    }
}

impl<C> EnvelopeSink for ReadModelSubscription<C>
where
    C: CheckpointStore + 'static,
{
    fn deliver(&self, batch: &[EventEnvelope]) {
        // Errors are per-stream, already logged; delivery itself never fails.
        let _ = self.handle_notification(batch);
    }
}

impl<C: CheckpointStore> core::fmt::Debug for ReadModelSubscription<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReadModelSubscription")
            .field("sources", &self.sources.len())
            .finish()
    }
}

/// A sorted group must form an unbroken ascending run: duplicates and gaps
/// are both ordering violations scoped to that stream.
fn verify_contiguous(group: &[EventEnvelope]) -> Result<(), String> {
    for pair in group.windows(2) {
        let (prev, next) = (pair[0].version(), pair[1].version());
        if next == prev {
            return Err(format!("duplicate version v{next} in batch"));
        }
        if next != prev + 1 {
            return Err(format!("gap in batch between v{prev} and v{next}"));
        }
    }
    Ok(())
}
