//! Rebuilds an entity's append-only status history from its snapshots.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::types::{
    ApprovalInfo, ChangeDate, DateOrdering, HistoryEntry, INITIAL_STATUS, RawSnapshot,
    compare_optional_dates, history_entry_id,
};

/// Ordered history of one natural key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconstructedHistory {
    pub entries: Vec<HistoryEntry>,
    pub approval: ApprovalInfo,
    /// Snapshots skipped because they carry no status.
    pub dropped_without_status: usize,
}

impl ReconstructedHistory {
    /// Status of the most recent entry.
    pub fn current_status(&self) -> Option<&str> {
        self.entries.last().map(|entry| entry.to_status.as_str())
    }
}

/// Derives transition records from a group of snapshots.
#[derive(Debug, Clone)]
pub struct HistoryReconstructor {
    approved_status: String,
    ordering: DateOrdering,
}

impl HistoryReconstructor {
    pub fn new(approved_status: impl Into<String>, ordering: DateOrdering) -> Self {
        Self {
            approved_status: approved_status.into(),
            ordering,
        }
    }

    /// Builds the history for `snapshots`, which must share one natural key.
    ///
    /// The result only depends on the set of snapshots, not their order.
    pub fn reconstruct(&self, snapshots: &[RawSnapshot]) -> ReconstructedHistory {
        let mut with_status: Vec<(&RawSnapshot, &str)> = snapshots
            .iter()
            .filter_map(|s| s.status.as_deref().map(|status| (s, status)))
            .collect();
        let dropped_without_status = snapshots.len() - with_status.len();

        with_status.sort_by(|(a, a_status), (b, b_status)| {
            self.chronological(a, b)
                .then_with(|| a_status.cmp(b_status))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut entries: Vec<HistoryEntry> = Vec::with_capacity(with_status.len());
        let mut seen_ids = HashSet::new();
        let mut previous_date: Option<&ChangeDate> = None;

        for (snapshot, status) in with_status {
            let change_date = snapshot.change_date.as_ref();
            let change_index = snapshot.change_index_or_zero();
            let id = history_entry_id(change_date.map(ChangeDate::raw), change_index, status);

            // Sorting put the smallest snapshot id first for every identity.
            if !seen_ids.insert(id.clone()) {
                continue;
            }

            let from_status = match entries.last() {
                Some(last) => last.to_status.clone(),
                None => INITIAL_STATUS.to_string(),
            };

            let days_in_previous_status = match (previous_date, change_date) {
                (Some(previous), Some(current)) => current.days_since(previous),
                _ => None,
            };

            entries.push(HistoryEntry {
                id,
                sequence: entries.len() as u32,
                from_status,
                to_status: status.to_string(),
                change_date: change_date.map(|d| d.raw().to_string()),
                change_index,
                agent: snapshot.agent.clone(),
                subject_id: snapshot.subject_id.clone(),
                auxiliary_id: snapshot.auxiliary_id.clone(),
                location_address: snapshot.location_address.clone(),
                source_snapshot_id: snapshot.id.clone(),
                days_in_previous_status,
                post_approval: false,
                import_batch: snapshot.import_batch.clone(),
                source_file: snapshot.source_file.clone(),
            });
            previous_date = change_date;
        }

        let approval = self.mark_approval(&mut entries);

        ReconstructedHistory {
            entries,
            approval,
            dropped_without_status,
        }
    }

    fn chronological(&self, a: &RawSnapshot, b: &RawSnapshot) -> Ordering {
        compare_optional_dates(a.change_date.as_ref(), b.change_date.as_ref(), self.ordering)
            .then_with(|| a.change_index_or_zero().cmp(&b.change_index_or_zero()))
    }

    fn mark_approval(&self, entries: &mut [HistoryEntry]) -> ApprovalInfo {
        let Some(position) = entries
            .iter()
            .position(|entry| entry.to_status == self.approved_status)
        else {
            return ApprovalInfo::default();
        };

        for entry in entries.iter_mut().skip(position + 1) {
            entry.post_approval = true;
        }

        ApprovalInfo {
            has_approval_history: true,
            approval_date: entries[position].change_date.clone(),
            has_post_approval_statuses: position + 1 < entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::fixtures::snapshot_from;

    const APPROVED: &str = "Pole Permission: Approved";

    fn snap(id: &str, status: Option<&str>, date: &str, index: i64) -> RawSnapshot {
        let mut attributes = json!({
            "poleNumber": "P-100",
            "dateStatusChanged": date,
            "changeIndex": index,
        });
        if let Some(status) = status {
            attributes["status"] = json!(status);
        }
        snapshot_from(id, attributes)
    }

    fn reconstructor() -> HistoryReconstructor {
        HistoryReconstructor::new(APPROVED, DateOrdering::Parsed)
    }

    #[test]
    fn duplicate_approval_collapses_to_two_entries() {
        let snapshots = vec![
            snap("r1", Some("Requested"), "2025-01-01", 0),
            snap("r2", Some(APPROVED), "2025-01-02", 0),
            snap("r3", Some(APPROVED), "2025-01-02", 0),
        ];

        let history = reconstructor().reconstruct(&snapshots);

        let transitions: Vec<_> = history
            .entries
            .iter()
            .map(|e| (e.from_status.as_str(), e.to_status.as_str()))
            .collect();
        assert_eq!(
            transitions,
            vec![("Initial", "Requested"), ("Requested", APPROVED)]
        );
        assert_eq!(history.entries[1].source_snapshot_id, "r2");
        assert_eq!(history.entries[1].days_in_previous_status, Some(1));
        assert_eq!(history.current_status(), Some(APPROVED));
        assert!(history.approval.has_approval_history);
        assert_eq!(history.approval.approval_date.as_deref(), Some("2025-01-02"));
        assert!(!history.approval.has_post_approval_statuses);
    }

    #[test]
    fn repeated_status_on_another_day_keeps_its_own_entry() {
        let mut first = snap("r1", Some("Requested"), "2025-01-01", 0);
        first.subject_id = Some("prop-A".to_string());
        let mut second = snap("r2", Some("Requested"), "2025-01-05", 0);
        second.subject_id = Some("prop-B".to_string());

        let history = reconstructor().reconstruct(&[second, first]);

        let entries: Vec<_> = history
            .entries
            .iter()
            .map(|e| {
                (
                    e.source_snapshot_id.as_str(),
                    e.subject_id.as_deref(),
                    e.from_status.as_str(),
                )
            })
            .collect();
        assert_eq!(
            entries,
            vec![
                ("r1", Some("prop-A"), "Initial"),
                ("r2", Some("prop-B"), "Requested"),
            ]
        );
        assert_eq!(history.entries[1].days_in_previous_status, Some(4));
        assert_ne!(history.entries[0].id, history.entries[1].id);
    }

    #[test]
    fn input_order_does_not_change_the_result() {
        let mut snapshots = vec![
            snap("r1", Some("Requested"), "2025-01-01", 0),
            snap("r2", Some(APPROVED), "2025-01-02", 0),
            snap("r3", Some("Installed"), "2025-01-09", 0),
            snap("r4", Some(APPROVED), "2025-01-02", 0),
        ];
        let forward = reconstructor().reconstruct(&snapshots);
        snapshots.reverse();
        let backward = reconstructor().reconstruct(&snapshots);

        assert_eq!(forward, backward);
    }

    #[test]
    fn change_index_orders_same_day_transitions() {
        let snapshots = vec![
            snap("r1", Some("Installed"), "2025-02-01", 2),
            snap("r2", Some(APPROVED), "2025-02-01", 1),
        ];

        let history = reconstructor().reconstruct(&snapshots);

        assert_eq!(history.entries[0].to_status, APPROVED);
        assert_eq!(history.entries[1].to_status, "Installed");
        assert!(history.entries[1].post_approval);
        assert!(history.approval.has_post_approval_statuses);
    }

    #[test]
    fn snapshots_without_status_are_counted_and_dropped() {
        let snapshots = vec![
            snap("r1", None, "2025-01-01", 0),
            snap("r2", Some("Requested"), "2025-01-02", 0),
        ];

        let history = reconstructor().reconstruct(&snapshots);

        assert_eq!(history.dropped_without_status, 1);
        assert_eq!(history.entries.len(), 1);
        assert_eq!(history.entries[0].from_status, INITIAL_STATUS);
    }

    #[test]
    fn entries_are_non_decreasing_in_date_and_index() {
        let snapshots = vec![
            snap("r5", Some("D"), "2025/03/01 08:00", 0),
            snap("r1", Some("A"), "2025-01-15 12:00:00", 4),
            snap("r2", Some("B"), "2025-01-15 12:00:00", 7),
            snap("r3", Some("C"), "2025-02-01", 0),
        ];

        let history = reconstructor().reconstruct(&snapshots);
        let statuses: Vec<_> = history.entries.iter().map(|e| e.to_status.as_str()).collect();

        assert_eq!(statuses, vec!["A", "B", "C", "D"]);
        let sequences: Vec<_> = history.entries.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }
}
