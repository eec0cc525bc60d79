use serde::Serialize;

use crate::types::Document;

/// `fromStatus` of the first entry in a history.
pub const INITIAL_STATUS: &str = "Initial";

const UNDATED: &str = "undated";

/// One status transition of an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Deterministic identity, see [`history_entry_id`].
    #[serde(skip)]
    pub id: String,
    /// Position within the reconstructed history.
    #[serde(skip)]
    pub sequence: u32,
    pub from_status: String,
    pub to_status: String,
    pub change_date: Option<String>,
    pub change_index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auxiliary_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_address: Option<String>,
    pub source_snapshot_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_in_previous_status: Option<i64>,
    pub post_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_batch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl HistoryEntry {
    /// Renders the entry as a destination document.
    pub fn to_document(&self) -> Document {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            // A struct of strings and integers always serializes to an object.
            _ => Document::new(),
        }
    }
}

/// Approval facts derived while reconstructing a history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalInfo {
    pub has_approval_history: bool,
    /// Raw change date of the first approval entry.
    pub approval_date: Option<String>,
    pub has_post_approval_statuses: bool,
}

/// Builds the identity of a history entry from `(change_date, change_index, to_status)`.
///
/// Every character outside `[A-Za-z0-9-]` is replaced by `_` so the id is path safe.
pub fn history_entry_id(change_date: Option<&str>, change_index: i64, to_status: &str) -> String {
    let date = change_date.unwrap_or(UNDATED);
    let raw = format!("{date}_{change_index}_{to_status}");

    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_id_is_path_safe() {
        let id = history_entry_id(
            Some("2025-04-30 10:15:00"),
            2,
            "Pole Permission: Approved",
        );

        assert_eq!(id, "2025-04-30_10_15_00_2_Pole_Permission__Approved");
    }

    #[test]
    fn undated_entries_get_a_stable_id() {
        assert_eq!(history_entry_id(None, 0, "Requested"), "undated_0_Requested");
    }

    #[test]
    fn document_omits_absent_fields() {
        let entry = HistoryEntry {
            id: "x".to_string(),
            sequence: 0,
            from_status: INITIAL_STATUS.to_string(),
            to_status: "Requested".to_string(),
            change_date: Some("2025-01-01".to_string()),
            change_index: 0,
            agent: None,
            subject_id: Some("P-1".to_string()),
            auxiliary_id: None,
            location_address: None,
            source_snapshot_id: "r1".to_string(),
            days_in_previous_status: None,
            post_approval: false,
            import_batch: None,
            source_file: None,
        };

        let document = entry.to_document();
        assert_eq!(document["fromStatus"], "Initial");
        assert_eq!(document["subjectId"], "P-1");
        assert!(!document.contains_key("agent"));
        assert!(!document.contains_key("sequence"));
    }
}
