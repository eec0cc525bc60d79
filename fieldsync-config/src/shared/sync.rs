use std::path::PathBuf;

use serde::Deserialize;

use crate::shared::ValidationError;

/// How change dates are compared when ordering snapshots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrderingConfig {
    /// Dates are parsed into instants. Unparseable dates sort first.
    #[default]
    Parsed,
    /// Raw date strings are compared byte by byte.
    Lexicographic,
}

/// Selects which staging records nominate entities for a run.
#[derive(Clone, Debug, Deserialize)]
pub struct StatusFilterConfig {
    pub field: String,
    pub values: Vec<String>,
}

impl Default for StatusFilterConfig {
    fn default() -> Self {
        Self {
            field: "status".to_string(),
            values: vec![default_approved_status()],
        }
    }
}

/// Sync run settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Number of staging records read per page.
    pub page_size: usize,
    pub status_filter: StatusFilterConfig,
    /// Optional limit on pages processed in one run.
    pub max_pages: Option<u64>,
    /// Optional wall clock budget for one run.
    pub max_runtime_secs: Option<u64>,
    /// Parallel destination lookups while grouping and classifying.
    pub max_concurrent_lookups: usize,
    /// Status value that marks an approval in the history.
    pub approved_status: String,
    pub date_ordering: DateOrderingConfig,
    /// Directory for JSON and CSV run reports.
    pub report_dir: PathBuf,
    /// Number of sample keys listed by the completeness auditor.
    pub audit_sample_size: usize,
}

impl SyncConfig {
    pub const DEFAULT_PAGE_SIZE: usize = 1000;
    pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 8;
    pub const DEFAULT_AUDIT_SAMPLE_SIZE: usize = 20;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.page_size == 0 {
            return Err(ValidationError::invalid(
                "sync.page_size",
                "must be at least 1",
            ));
        }
        if self.max_concurrent_lookups == 0 {
            return Err(ValidationError::invalid(
                "sync.max_concurrent_lookups",
                "must be at least 1",
            ));
        }
        if self.status_filter.field.trim().is_empty() {
            return Err(ValidationError::invalid(
                "sync.status_filter.field",
                "must not be empty",
            ));
        }
        if self.status_filter.values.is_empty() {
            return Err(ValidationError::invalid(
                "sync.status_filter.values",
                "must list at least one status",
            ));
        }

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: Self::DEFAULT_PAGE_SIZE,
            status_filter: StatusFilterConfig::default(),
            max_pages: None,
            max_runtime_secs: None,
            max_concurrent_lookups: Self::DEFAULT_MAX_CONCURRENT_LOOKUPS,
            approved_status: default_approved_status(),
            date_ordering: DateOrderingConfig::default(),
            report_dir: PathBuf::from("reports"),
            audit_sample_size: Self::DEFAULT_AUDIT_SAMPLE_SIZE,
        }
    }
}

fn default_approved_status() -> String {
    "Pole Permission: Approved".to_string()
}
