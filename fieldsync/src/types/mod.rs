mod date;
mod entity;
mod history;
mod mirror;
mod record;
mod snapshot;
mod write;

pub use date::{ChangeDate, DateOrdering, compare_optional_dates};
pub use entity::{EntityWrite, SyncMetadata};
pub use history::{ApprovalInfo, HistoryEntry, INITIAL_STATUS, history_entry_id};
pub use mirror::{ChangeEvent, ChangeOperation, DeadLetterRecord, SyncFailure};
pub use record::{Document, PageCursor, StagingPage, StagingRecord, StatusFilter, deep_merge};
pub(crate) use record::scalar_to_string;
pub use snapshot::RawSnapshot;
pub use write::{WriteBatch, WriteOp};
