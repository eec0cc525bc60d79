//! Replicates field-survey snapshots from a staging store into a production store.
//!
//! A sync run pages through staging, groups snapshots by natural key, resolves the
//! latest state, rebuilds the status history and commits both in bounded atomic
//! batches. Progress is checkpointed so runs can be interrupted and resumed. Every
//! production write can be mirrored into a relational warehouse with retry and
//! dead-letter handling.

pub mod audit;
pub mod checkpoint;
pub mod commit;
pub mod concurrency;
pub mod conflict;
pub mod entity;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod history;
mod macros;
pub mod mapping;
pub mod metrics;
pub mod mirror;
pub mod monitor;
pub mod pipeline;
pub mod policy;
pub mod report;
pub mod resolve;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
