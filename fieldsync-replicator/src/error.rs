use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

use fieldsync::error::SyncError;
use fieldsync::policy::{ErrorHandlingPolicy, RetryDirective, build_error_handling_policy};

pub type ReplicatorResult<T> = Result<T, ReplicatorError>;

/// Where the replicator was when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Loading or validating configuration, or an unusable command line.
    Config,
    /// Connecting to or migrating a Postgres store.
    Store,
    /// Running a sync, audit or mirror operation.
    Sync,
    /// Runtime setup or report files.
    Io,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Config => "configuration",
            Stage::Store => "store setup",
            Stage::Sync => "sync",
            Stage::Io => "i/o",
        }
    }
}

/// Error returned by every replicator command.
pub struct ReplicatorError {
    stage: Stage,
    inner: Box<dyn Error + Send + Sync>,
    policy: Option<ErrorHandlingPolicy>,
    backtrace: Backtrace,
}

impl ReplicatorError {
    pub fn new<E: Error + Send + Sync + 'static>(stage: Stage, err: E) -> Self {
        Self {
            stage,
            inner: Box::new(err),
            policy: None,
            backtrace: Backtrace::capture(),
        }
    }

    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        Self::new(Stage::Config, err)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Multi-line report for stderr: stage, message and the chain of causes.
    ///
    /// Includes the backtrace when one was captured, see `RUST_BACKTRACE`.
    pub fn render_report(&self) -> String {
        let mut lines = vec![
            format!("fieldsync-replicator failed during {}", self.stage.as_str()),
            format!("error: {}", self.inner),
        ];

        let mut cause = self.inner.source();
        while let Some(err) = cause {
            lines.push(format!("caused by: {err}"));
            cause = err.source();
        }

        if let Some(policy) = &self.policy {
            if let Some(solution) = policy.solution() {
                lines.push(format!("hint: {solution}"));
            }
            if policy.retry_directive() == RetryDirective::Rerun {
                lines.push("the command can be run again as is".to_string());
            }
        }

        if self.backtrace.status() == BacktraceStatus::Captured {
            lines.push(format!("backtrace:\n{}", self.backtrace));
        }

        let mut report = lines.join("\n");
        report.push('\n');
        report
    }
}

impl fmt::Debug for ReplicatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicatorError")
            .field("stage", &self.stage)
            .field("inner", &self.inner)
            .finish()
    }
}

impl fmt::Display for ReplicatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage.as_str(), self.inner)
    }
}

impl Error for ReplicatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl From<SyncError> for ReplicatorError {
    fn from(err: SyncError) -> Self {
        let policy = build_error_handling_policy(&err);
        Self {
            policy: Some(policy),
            ..Self::new(Stage::Sync, err)
        }
    }
}

impl From<sqlx::Error> for ReplicatorError {
    fn from(err: sqlx::Error) -> Self {
        Self::new(Stage::Store, err)
    }
}

impl From<std::io::Error> for ReplicatorError {
    fn from(err: std::io::Error) -> Self {
        Self::new(Stage::Io, err)
    }
}

#[cfg(test)]
mod tests {
    use fieldsync::error::ErrorKind;
    use fieldsync_config::shared::ValidationError;

    use super::*;

    #[test]
    fn report_names_stage_and_message() {
        let err = ReplicatorError::config(ValidationError::EmptyNaturalKeyFields);

        let report = err.render_report();

        assert!(report.starts_with("fieldsync-replicator failed during configuration\n"));
        assert!(report.contains("error: `mapping.snapshot.natural_key`"));
    }

    #[test]
    fn sync_errors_are_attributed_to_the_sync_stage() {
        let err = ReplicatorError::from(SyncError::from((
            ErrorKind::CommitFailure,
            "Batch commit failed",
        )));

        assert_eq!(err.stage(), Stage::Sync);
        assert!(err.to_string().contains("Batch commit failed"));

        let report = err.render_report();
        assert!(report.contains("hint: The checkpoint holds the last committed batch."));
        assert!(report.contains("the command can be run again as is"));
    }
}
