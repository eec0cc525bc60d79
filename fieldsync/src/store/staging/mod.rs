mod base;
mod memory;
mod postgres;

pub use base::StagingStore;
pub use memory::MemoryStaging;
pub use postgres::PostgresStaging;
