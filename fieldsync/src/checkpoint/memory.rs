use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::SyncResult;

/// In-memory checkpoint store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Arc<Mutex<HashMap<String, Checkpoint>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, pipeline: &str) -> SyncResult<Option<Checkpoint>> {
        Ok(self.checkpoints.lock().await.get(pipeline).cloned())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> SyncResult<()> {
        let mut checkpoints = self.checkpoints.lock().await;
        checkpoints.insert(checkpoint.pipeline.clone(), checkpoint.clone());

        Ok(())
    }
}
