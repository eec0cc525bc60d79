//! Run progress tracking.
//!
//! A [`Checkpoint`] records the staging cursor of a pipeline together with progress
//! counters. The set of keys already migrated is not persisted: it is rebuilt from the
//! destination by source tag, so any process reconstructs the same exclusion set.

mod base;
mod manager;
mod memory;
mod postgres;

pub use base::{Checkpoint, CheckpointStatus, CheckpointStore};
pub use manager::{CheckpointManager, UnprocessedBatch};
pub use memory::MemoryCheckpointStore;
pub use postgres::PostgresCheckpointStore;
