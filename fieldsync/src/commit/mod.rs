//! Bounded atomic commits of entity and history writes.

mod batch;
mod coordinator;

pub use batch::{PlannedBatch, plan_batches};
pub use coordinator::BatchCommitCoordinator;
