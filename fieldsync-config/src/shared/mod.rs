//! Shared configuration types for fieldsync pipelines.

mod base;
mod batch;
mod connection;
mod fieldsync;
mod mapping;
mod mirror;
mod pipeline;
mod store;
mod sync;

pub use base::ValidationError;
pub use batch::BatchConfig;
pub use connection::{PgConnectionConfig, SessionProfile, TlsConfig};
pub use fieldsync::FieldsyncConfig;
pub use mapping::{CoercionKind, FieldMappingConfig, MappingConfig, SnapshotFieldsConfig};
pub use mirror::MirrorConfig;
pub use pipeline::PipelineConfig;
pub use store::StoreConfig;
pub use sync::{DateOrderingConfig, StatusFilterConfig, SyncConfig};
