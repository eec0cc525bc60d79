//! Concurrency utilities shared by the sync pipeline and the mirror workers.
//!
//! Orchestration stays sequential: pages are processed one at a time and commits are
//! strictly ordered. The only concurrency inside a run is the bounded fan-out of per-key
//! lookups in [`fanout`]. Long running workers stop through the [`shutdown`] signal.

pub mod fanout;
pub mod shutdown;
