//! Assembles the canonical entity and its history for one natural key.

use chrono::{DateTime, SecondsFormat, Utc};
use fieldsync_config::shared::FieldsyncConfig;
use serde_json::{Value, json};

use crate::conflict::LAST_SYNCED_FROM;
use crate::error::SyncResult;
use crate::history::HistoryReconstructor;
use crate::mapping::{FieldMapper, MappingIssue};
use crate::resolve::resolve_latest;
use crate::types::{DateOrdering, EntityWrite, RawSnapshot, SyncMetadata};

/// Writes for one key plus what was learned while building them.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltEntity {
    pub write: EntityWrite,
    pub issues: Vec<MappingIssue>,
    pub dropped_without_status: usize,
    /// Id of the snapshot chosen as current state.
    pub latest_snapshot_id: String,
}

/// Turns a key's snapshot group into an [`EntityWrite`].
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    mapper: FieldMapper,
    reconstructor: HistoryReconstructor,
    ordering: DateOrdering,
    source_tag: String,
    sync_type: String,
}

impl EntityBuilder {
    pub fn new(
        mapper: FieldMapper,
        reconstructor: HistoryReconstructor,
        ordering: DateOrdering,
        source_tag: impl Into<String>,
        sync_type: impl Into<String>,
    ) -> Self {
        Self {
            mapper,
            reconstructor,
            ordering,
            source_tag: source_tag.into(),
            sync_type: sync_type.into(),
        }
    }

    pub fn from_config(config: &FieldsyncConfig) -> SyncResult<Self> {
        let ordering = DateOrdering::from(config.sync.date_ordering);

        Ok(Self::new(
            FieldMapper::from_config(&config.mapping)?,
            HistoryReconstructor::new(config.sync.approved_status.clone(), ordering),
            ordering,
            config.pipeline.source_tag.clone(),
            config.pipeline.sync_type.clone(),
        ))
    }

    /// Builds the writes for `natural_key`, or [`None`] for an empty group.
    ///
    /// `synced_at` is stamped as `lastSyncDate`.
    pub fn build(
        &self,
        natural_key: &str,
        snapshots: &[RawSnapshot],
        synced_at: DateTime<Utc>,
    ) -> Option<BuiltEntity> {
        let latest = resolve_latest(snapshots, self.ordering)?;
        let history = self.reconstructor.reconstruct(snapshots);
        let mapped = self.mapper.map(latest.snapshot);

        let mut document = mapped.document;
        if let Some(status) = history.current_status() {
            document.insert("currentStatus".to_string(), json!(status));
        }
        document.insert(LAST_SYNCED_FROM.to_string(), json!(self.source_tag));
        document.insert(
            "lastSyncDate".to_string(),
            json!(synced_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        document.insert("totalStatusRecords".to_string(), json!(latest.group_size));
        document.insert(
            "hasApprovalHistory".to_string(),
            json!(history.approval.has_approval_history),
        );
        if let Some(approval_date) = &history.approval.approval_date {
            document.insert("approvalDate".to_string(), json!(approval_date));
        }

        let metadata = SyncMetadata {
            sync_type: self.sync_type.clone(),
            source_system: self.source_tag.clone(),
            total_status_changes: history.entries.len(),
            has_post_approval_statuses: history.approval.has_post_approval_statuses,
        };
        document.insert(
            "syncMetadata".to_string(),
            Value::Object(metadata.to_document()),
        );

        Some(BuiltEntity {
            latest_snapshot_id: latest.snapshot.id.clone(),
            write: EntityWrite {
                natural_key: natural_key.to_string(),
                document,
                history: history.entries,
            },
            issues: mapped.issues,
            dropped_without_status: history.dropped_without_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::test_utils::fixtures::{config, p100_records, snapshot_from};

    fn builder() -> EntityBuilder {
        EntityBuilder::from_config(&config("onemap")).unwrap()
    }

    #[test]
    fn p100_builds_two_entries_and_approved_entity() {
        let snapshots: Vec<_> = p100_records()
            .into_iter()
            .map(|r| snapshot_from(&r.id, serde_json::Value::Object(r.attributes)))
            .collect();
        let synced_at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();

        let built = builder().build("P-100", &snapshots, synced_at).unwrap();
        let document = &built.write.document;

        assert_eq!(built.write.history.len(), 2);
        assert_eq!(document["currentStatus"], "Pole Permission: Approved");
        assert_eq!(document["lastSyncedFrom"], "vf-onemap-data");
        assert_eq!(document["lastSyncDate"], "2025-06-01T08:00:00.000Z");
        assert_eq!(document["totalStatusRecords"], 3);
        assert_eq!(document["hasApprovalHistory"], true);
        assert_eq!(document["approvalDate"], "2025-01-02");
        assert_eq!(document["poleNumber"], "P-100");
        assert_eq!(
            document["syncMetadata"],
            json!({
                "syncType": "full-status-history",
                "sourceSystem": "vf-onemap-data",
                "totalStatusChanges": 2,
                "hasPostApprovalStatuses": false,
            })
        );
    }

    #[test]
    fn mapping_issues_are_returned_not_fatal() {
        let snapshots = vec![snapshot_from(
            "r1",
            json!({
                "poleNumber": "P-7",
                "status": "Requested",
                "dateStatusChanged": "2025-01-01",
                "latitude": "not a number",
            }),
        )];

        let built = builder().build("P-7", &snapshots, Utc::now()).unwrap();

        assert_eq!(built.issues.len(), 1);
        assert_eq!(built.issues[0].source_field, "latitude");
        assert!(built.write.document.get("location").is_none());
        assert_eq!(built.write.document["currentStatus"], "Requested");
    }
}
