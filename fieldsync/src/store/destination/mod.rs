mod base;
mod memory;
mod postgres;

pub use base::{DestinationStore, StoredHistoryEntry};
pub use memory::MemoryDestination;
pub use postgres::PostgresDestination;
