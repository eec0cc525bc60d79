//! Run reports persisted by `sync`.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

/// What happened to one natural key or record during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Synced,
    /// Dry run only: the key would have been written.
    WouldSync,
    AlreadySynced,
    Conflict,
    MissingKey,
    MappingError,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Synced => "synced",
            Outcome::WouldSync => "would_sync",
            Outcome::AlreadySynced => "already_synced",
            Outcome::Conflict => "conflict",
            Outcome::MissingKey => "missing_key",
            Outcome::MappingError => "mapping_error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the run report.
///
/// `natural_key` is empty for records without a resolvable key. Their record id and
/// provenance are in `detail`. A nominated key whose snapshots could no longer be
/// found is also reported as [`Outcome::MissingKey`], with the key set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyOutcome {
    pub natural_key: String,
    pub outcome: Outcome,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every staging page was processed.
    Exhausted,
    TimeBudget,
    PageLimit,
    /// A batch was rejected after its retry. The checkpoint holds the last committed batch.
    CommitFailure,
}

/// Totals of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub records_read: u64,
    pub records_excluded: u64,
    pub keys_synced: u64,
    pub history_entries_written: u64,
    pub already_synced: u64,
    pub conflicts: u64,
    pub missing_keys: u64,
    pub mapping_errors: u64,
    pub snapshots_without_status: u64,
    pub pages_completed: u64,
    pub batches_committed: u64,
}

/// Structured summary of one sync run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub pipeline: String,
    pub source_tag: String,
    pub run_id: Uuid,
    pub dry_run: bool,
    pub resumed: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stop_reason: StopReason,
    /// Error that stopped the run, if any.
    pub error: Option<String>,
    pub totals: RunTotals,
    pub outcomes: Vec<KeyOutcome>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.stop_reason != StopReason::CommitFailure
    }

    pub fn outcomes_of(&self, outcome: Outcome) -> impl Iterator<Item = &KeyOutcome> {
        self.outcomes.iter().filter(move |o| o.outcome == outcome)
    }

    /// File stem shared by the JSON and CSV report.
    pub fn file_stem(&self) -> String {
        format!(
            "sync_{}_{}",
            self.pipeline,
            self.started_at.format("%Y%m%dT%H%M%SZ")
        )
    }

    /// Renders the outcomes as CSV with a `natural_key,outcome,detail` header.
    pub fn to_csv(&self) -> SyncResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["natural_key", "outcome", "detail"])?;
        for outcome in &self.outcomes {
            writer.write_record([
                outcome.natural_key.as_str(),
                outcome.outcome.as_str(),
                outcome.detail.as_str(),
            ])?;
        }

        writer
            .into_inner()
            .map_err(|err| SyncError::from(std::io::Error::other(err.to_string())))
    }

    /// Writes `<stem>.json` and `<stem>.csv` into `dir`, creating it when needed.
    pub async fn write_to(&self, dir: &Path) -> SyncResult<ReportPaths> {
        tokio::fs::create_dir_all(dir).await?;

        let stem = self.file_stem();
        let paths = ReportPaths {
            json: dir.join(format!("{stem}.json")),
            csv: dir.join(format!("{stem}.csv")),
        };

        tokio::fs::write(&paths.json, serde_json::to_vec_pretty(self)?).await?;
        tokio::fs::write(&paths.csv, self.to_csv()?).await?;

        info!(json = %paths.json.display(), csv = %paths.csv.display(), "run report written");

        Ok(paths)
    }
}

/// Where a report was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub csv: PathBuf,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn report() -> RunReport {
        let started_at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 5).unwrap();

        RunReport {
            pipeline: "onemap".to_string(),
            source_tag: "vf-onemap-data".to_string(),
            run_id: Uuid::nil(),
            dry_run: false,
            resumed: false,
            started_at,
            finished_at: started_at,
            stop_reason: StopReason::Exhausted,
            error: None,
            totals: RunTotals::default(),
            outcomes: vec![
                KeyOutcome {
                    natural_key: "P-1".to_string(),
                    outcome: Outcome::Synced,
                    detail: "2 history entries".to_string(),
                },
                KeyOutcome {
                    natural_key: "P-2".to_string(),
                    outcome: Outcome::Conflict,
                    detail: "existing lastSyncedFrom: manual, import".to_string(),
                },
            ],
        }
    }

    #[test]
    fn csv_has_one_row_per_outcome() {
        let csv = String::from_utf8(report().to_csv().unwrap()).unwrap();
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines[0], "natural_key,outcome,detail");
        assert_eq!(lines[1], "P-1,synced,2 history entries");
        assert_eq!(lines[2], "P-2,conflict,\"existing lastSyncedFrom: manual, import\"");
    }

    #[tokio::test]
    async fn writes_json_and_csv_side_by_side() {
        let dir = tempfile::tempdir().unwrap();

        let paths = report().write_to(&dir.path().join("reports")).await.unwrap();

        assert!(paths.json.ends_with("sync_onemap_20250601T083005Z.json"));
        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&paths.json).unwrap()).unwrap();
        assert_eq!(json["stop_reason"], "exhausted");
        assert_eq!(json["outcomes"][1]["outcome"], "conflict");
        assert!(paths.csv.exists());
    }
}
