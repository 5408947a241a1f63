//! Checkpoint (projection cursor) persistence contract.
//!
//! A checkpoint is the durable per-stream cursor marking how far a read model
//! has been projected. It enables:
//! - Idempotent projections (redeliveries at or below the checkpoint are skipped)
//! - Resume after crash (projection continues from the last position)
//! - Deterministic rebuilds (clear checkpoints and replay from scratch)

use std::sync::Arc;

use parkflow_core::StreamName;

/// Position reported for a stream that has never been projected.
///
/// Never negative and never equal to a real version already projected
/// (real versions start at 1).
pub const START_POSITION: u64 = 0;

/// Durable per-stream cursor store.
///
/// Checkpoints are created lazily on the first successful projection of a
/// stream and are advanced forward-only **by convention**: the store itself is
/// a plain upsert, and the projector is responsible for never writing a
/// position behind one it has read (it holds a per-stream lock across the
/// read-project-write sequence).
pub trait CheckpointStore: Send + Sync {
    /// Current position for a stream ([`START_POSITION`] when unset).
    fn load_checkpoint(&self, stream: &StreamName) -> u64;

    /// Upsert the position for a stream.
    fn save_checkpoint(&self, stream: &StreamName, position: u64);
}

impl<S> CheckpointStore for Arc<S>
where
    S: CheckpointStore + ?Sized,
{
    fn load_checkpoint(&self, stream: &StreamName) -> u64 {
        (**self).load_checkpoint(stream)
    }

    fn save_checkpoint(&self, stream: &StreamName, position: u64) {
        (**self).save_checkpoint(stream, position)
    }
}
