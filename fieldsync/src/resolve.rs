//! Picks the snapshot that represents an entity's current state.

use std::cmp::Ordering;

use crate::types::{DateOrdering, RawSnapshot, compare_optional_dates};

/// The chosen snapshot and the size of the group it was chosen from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatestState<'a> {
    pub snapshot: &'a RawSnapshot,
    pub group_size: usize,
}

/// Selects the latest snapshot of a group sharing one natural key.
///
/// Snapshots compare by `last_modified`, falling back to `change_date`, newest first.
/// Snapshots without either date lose to dated ones. Ties go to the lowest record id,
/// which is ingestion order, so the result does not depend on the input order.
pub fn resolve_latest(
    snapshots: &[RawSnapshot],
    ordering: DateOrdering,
) -> Option<LatestState<'_>> {
    let snapshot = snapshots
        .iter()
        .min_by(|a, b| latest_first(a, b, ordering))?;

    Some(LatestState {
        snapshot,
        group_size: snapshots.len(),
    })
}

fn latest_first(a: &RawSnapshot, b: &RawSnapshot, ordering: DateOrdering) -> Ordering {
    let by_date = match (a.effective_date(), b.effective_date()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (a_date, b_date) => compare_optional_dates(b_date, a_date, ordering),
    };

    by_date.then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::fixtures::snapshot_from;

    fn snap(id: &str, modified: Option<&str>, changed: Option<&str>) -> RawSnapshot {
        let mut attributes = json!({ "poleNumber": "P-1", "status": id });
        if let Some(modified) = modified {
            attributes["lastModifiedDate"] = json!(modified);
        }
        if let Some(changed) = changed {
            attributes["dateStatusChanged"] = json!(changed);
        }
        snapshot_from(id, attributes)
    }

    #[test]
    fn last_modified_wins_over_change_date() {
        let snapshots = vec![
            snap("r1", Some("2025-05-03"), Some("2025-05-01")),
            snap("r2", None, Some("2025-05-02")),
        ];

        let latest = resolve_latest(&snapshots, DateOrdering::Parsed).unwrap();

        assert_eq!(latest.snapshot.id, "r1");
        assert_eq!(latest.group_size, 2);
    }

    #[test]
    fn ties_break_to_ingestion_order_regardless_of_input_order() {
        let a = snap("r1", None, Some("2025-05-02"));
        let b = snap("r2", None, Some("2025-05-02"));

        let forward = vec![a.clone(), b.clone()];
        let backward = vec![b, a];

        assert_eq!(
            resolve_latest(&forward, DateOrdering::Parsed).unwrap().snapshot.id,
            "r1"
        );
        assert_eq!(
            resolve_latest(&backward, DateOrdering::Parsed).unwrap().snapshot.id,
            "r1"
        );
    }

    #[test]
    fn undated_snapshots_lose() {
        let snapshots = vec![snap("r0", None, None), snap("r9", None, Some("garbled"))];

        let latest = resolve_latest(&snapshots, DateOrdering::Parsed).unwrap();
        assert_eq!(latest.snapshot.id, "r9");
    }

    #[test]
    fn empty_group_has_no_latest_state() {
        assert!(resolve_latest(&[], DateOrdering::Parsed).is_none());
    }
}
