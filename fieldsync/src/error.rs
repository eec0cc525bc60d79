//! Error types and result definitions for sync operations.
//!
//! [`SyncError`] carries a classified [`ErrorKind`], a static description, optional
//! dynamic detail, an optional source error and the callsite where it was created.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Main error type for sync operations.
///
/// Cheap to clone so one failure can be recorded in a report and still be returned.
#[derive(Debug, Clone)]
pub struct SyncError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Categories of failures that can occur while syncing.
///
/// Record level conditions such as [`ErrorKind::MissingKey`] are normally reported as
/// outcomes rather than returned, but they share the taxonomy so they can be logged
/// and counted uniformly.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Record level
    MissingKey,
    MappingError,
    ConflictDetected,

    // Write path
    CommitFailure,
    MirrorWriteFailure,

    // Stores
    StagingQueryFailed,
    DestinationQueryFailed,
    WarehouseQueryFailed,
    CheckpointStoreFailed,
    ConnectionFailed,

    // Configuration
    ConfigError,
    InvalidMapping,

    // IO & serialization
    IoError,
    SerializationError,
    DeserializationError,

    InvalidState,
    Unknown,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Callsite that created this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches an originating error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns this error reclassified under `kind`.
    ///
    /// Used by stores to tag driver errors with the store they came from.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SyncError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
        }
    }
}

/// Errors compare by kind only.
impl PartialEq for SyncError {
    fn eq(&self, other: &SyncError) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} @ {}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line()
        )?;

        match self.detail.as_deref().map(str::trim) {
            None => Ok(()),
            Some("") => write!(f, "\n  Detail: <empty>"),
            Some(detail) => {
                write!(f, "\n  Detail:")?;
                for line in detail.lines() {
                    write!(f, "\n    {line}")?;
                }
                Ok(())
            }
        }
    }
}

impl error::Error for SyncError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for SyncError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for SyncError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

impl From<std::io::Error> for SyncError {
    #[track_caller]
    fn from(err: std::io::Error) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Maps syntax and data errors to [`ErrorKind::DeserializationError`].
impl From<serde_json::Error> for SyncError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SyncError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<csv::Error> for SyncError {
    #[track_caller]
    fn from(err: csv::Error) -> SyncError {
        let kind = if err.is_io_error() {
            ErrorKind::IoError
        } else {
            ErrorKind::SerializationError
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed("CSV report write failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Connection and pool errors map to [`ErrorKind::ConnectionFailed`].
///
/// Everything else is a query failure whose store is unknown here, so it starts as
/// [`ErrorKind::DestinationQueryFailed`]. Stores reclassify with [`SyncError::with_kind`].
impl From<sqlx::Error> for SyncError {
    #[track_caller]
    fn from(err: sqlx::Error) -> SyncError {
        let kind = match &err {
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => ErrorKind::ConnectionFailed,
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => ErrorKind::ConnectionFailed,
            _ => ErrorKind::DestinationQueryFailed,
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed("Database operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<fieldsync_config::shared::ValidationError> for SyncError {
    #[track_caller]
    fn from(err: fieldsync_config::shared::ValidationError) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
