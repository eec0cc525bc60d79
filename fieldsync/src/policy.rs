use crate::error::{ErrorKind, SyncError};

/// Whether a failed run can simply be started again.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RetryDirective {
    /// Re-running later is expected to succeed.
    Rerun,
    /// The operator must fix something first.
    Manual,
}

/// Describes how an operator should respond to a [`SyncError`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ErrorHandlingPolicy {
    retry_directive: RetryDirective,
    solution: Option<&'static str>,
}

impl ErrorHandlingPolicy {
    const fn new(retry_directive: RetryDirective, solution: Option<&'static str>) -> Self {
        Self {
            retry_directive,
            solution,
        }
    }

    pub fn retry_directive(&self) -> RetryDirective {
        self.retry_directive
    }

    /// Returns an operator facing hint, if one applies.
    pub fn solution(&self) -> Option<&'static str> {
        self.solution
    }
}

/// Classifies an error so the replicator can print a consistent hint.
pub fn build_error_handling_policy(error: &SyncError) -> ErrorHandlingPolicy {
    match error.kind() {
        ErrorKind::ConnectionFailed => ErrorHandlingPolicy::new(
            RetryDirective::Rerun,
            Some("Check that the configured databases are reachable and run the command again."),
        ),
        ErrorKind::CommitFailure => ErrorHandlingPolicy::new(
            RetryDirective::Rerun,
            Some(
                "The checkpoint holds the last committed batch. Run sync again to resume from it.",
            ),
        ),
        ErrorKind::StagingQueryFailed
        | ErrorKind::DestinationQueryFailed
        | ErrorKind::WarehouseQueryFailed
        | ErrorKind::CheckpointStoreFailed => ErrorHandlingPolicy::new(RetryDirective::Rerun, None),
        ErrorKind::ConfigError | ErrorKind::InvalidMapping => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Fix the configuration files or FIELDSYNC_ environment overrides."),
        ),
        ErrorKind::IoError => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Verify that the report directory exists and is writable."),
        ),
        _ => ErrorHandlingPolicy::new(RetryDirective::Manual, None),
    }
}
