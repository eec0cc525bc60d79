//! Turns staging records into snapshots and snapshots into destination documents.

mod coerce;
mod mapper;
mod schema;

pub use coerce::{CoercionError, coerce};
pub use mapper::{FieldMapper, FieldMapping, MappedDocument, MappingIssue};
pub use schema::{MissingKey, SnapshotSchema};
