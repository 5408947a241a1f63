//! Change notification plumbing (mechanics only).
//!
//! After events are committed to the store they are handed to whatever read
//! side is listening. The contract here is intentionally small:
//!
//! - **Transport-agnostic**: sinks don't know how batches reach them.
//! - **At-least-once**: a batch may be delivered more than once; downstream
//!   consumers skip by checkpoint.
//! - **No cross-stream ordering**: a single notification batch may interleave
//!   envelopes from unrelated streams; only intra-stream commit order holds.
//!
//! The bundled [`InlineNotifier`] delivers synchronously on the publishing
//! thread, so projection work runs on the save caller's critical path. An
//! asynchronous queue-based source can replace it without touching consumers,
//! as long as it keeps handing sinks whole batches.

use std::sync::{Arc, PoisonError, RwLock};

use crate::envelope::EventEnvelope;

/// A consumer of change-notification batches.
pub trait EnvelopeSink: Send + Sync {
    /// Handle one notification batch. Failures must be handled (and logged)
    /// internally; delivery itself does not fail.
    fn deliver(&self, batch: &[EventEnvelope]);
}

/// Something a subscription can attach to in order to receive notifications.
pub trait NotificationSource: Send + Sync {
    /// Register a sink. Attaching the same sink twice is a no-op.
    fn attach(&self, sink: Arc<dyn EnvelopeSink>);

    /// Remove a previously attached sink (matched by identity).
    fn detach(&self, sink: &Arc<dyn EnvelopeSink>);
}

/// Synchronous, in-process notification source.
///
/// `publish` fans a batch out to every attached sink, in attach order, on the
/// calling thread. This is the reference delivery shape: in-line with the
/// triggering save, no queue, no thread.
#[derive(Default)]
pub struct InlineNotifier {
    sinks: RwLock<Vec<Arc<dyn EnvelopeSink>>>,
}

impl InlineNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a batch of committed envelopes to every attached sink.
    pub fn publish(&self, batch: &[EventEnvelope]) {
        if batch.is_empty() {
            return;
        }
        // Snapshot under the lock, deliver outside it: a sink may re-enter
        // attach/detach from its handler.
        let sinks = self
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for sink in sinks {
            sink.deliver(batch);
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl core::fmt::Debug for InlineNotifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InlineNotifier")
            .field("sinks", &self.sink_count())
            .finish()
    }
}

impl NotificationSource for InlineNotifier {
    fn attach(&self, sink: Arc<dyn EnvelopeSink>) {
        let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        if sinks.iter().any(|s| Arc::ptr_eq(s, &sink)) {
            return;
        }
        sinks.push(sink);
    }

    fn detach(&self, sink: &Arc<dyn EnvelopeSink>) {
        let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        sinks.retain(|s| !Arc::ptr_eq(s, sink));
    }
}
