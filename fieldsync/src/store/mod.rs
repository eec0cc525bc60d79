//! Storage abstractions for the staging and production document stores.
//!
//! Each store is a trait with an in-memory implementation for tests and local runs
//! and a Postgres implementation backed by `fieldsync-postgres`.

pub mod destination;
pub mod staging;

use serde_json::Value;

use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::sync_error;
use crate::types::Document;

/// Converts a driver error, tagging query failures with the store they came from.
#[track_caller]
pub(crate) fn store_error(err: sqlx::Error, kind: ErrorKind) -> SyncError {
    let error = SyncError::from(err);
    if error.kind() == ErrorKind::ConnectionFailed {
        return error;
    }

    error.with_kind(kind)
}

/// Unwraps a stored JSON value that must be an object.
pub(crate) fn into_document(value: Value, context: &str) -> SyncResult<Document> {
    match value {
        Value::Object(document) => Ok(document),
        other => Err(sync_error!(
            ErrorKind::DeserializationError,
            "Stored document is not a JSON object",
            format!("{context} holds {other}")
        )),
    }
}
