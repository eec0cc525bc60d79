//! Change-capture mirror into the relational warehouse.
//!
//! [`CapturingDestination`] turns every committed production write into a [`ChangeEvent`]
//! on an unbounded channel. [`MirrorWorker`] applies those events to a [`Warehouse`] and
//! records a [`SyncFailure`] when that fails. [`RetryWorker`] re-attempts failures from
//! the current production state and dead-letters them once they run out of attempts.
//!
//! [`ChangeEvent`]: crate::types::ChangeEvent
//! [`SyncFailure`]: crate::types::SyncFailure

mod base;
mod capture;
mod memory;
mod postgres;
mod retry;
mod worker;

pub use base::Warehouse;
pub use capture::{CapturingDestination, CollectionTags, EventReceiver};
pub use memory::{MemoryWarehouse, ProjectionRow};
pub use postgres::PostgresWarehouse;
pub use retry::{AttemptResult, MirrorState, RetryPassSummary, RetryWorker, next_state};
pub use worker::{MirrorSummary, MirrorWorker};
