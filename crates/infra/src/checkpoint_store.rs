//! In-memory checkpoint store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use parkflow_core::StreamName;
use parkflow_events::{CheckpointStore, START_POSITION};

/// Thread-safe map of stream name to last-processed version.
///
/// Streams with no saved checkpoint read as [`START_POSITION`], so a fresh
/// projector starts from the beginning of history without any setup step.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<StreamName, u64>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn load_checkpoint(&self, stream: &StreamName) -> u64 {
        self.checkpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(stream)
            .copied()
            .unwrap_or(START_POSITION)
    }

    fn save_checkpoint(&self, stream: &StreamName, position: u64) {
        self.checkpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(stream.clone(), position);
    }
}
