use crate::types::{ChangeDate, Document};

/// One immutable staging snapshot with its semantic fields extracted.
///
/// `attributes` keeps the complete source record so the field mapper can read
/// fields that have no dedicated slot here.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSnapshot {
    /// Id of the staging record this snapshot came from.
    pub id: String,
    pub natural_key: String,
    pub subject_id: Option<String>,
    pub status: Option<String>,
    pub change_date: Option<ChangeDate>,
    pub change_index: Option<i64>,
    pub last_modified: Option<ChangeDate>,
    pub agent: Option<String>,
    pub location_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub auxiliary_id: Option<String>,
    pub workflow_groups: Vec<String>,
    pub import_batch: Option<String>,
    pub source_file: Option<String>,
    pub attributes: Document,
}

impl RawSnapshot {
    /// Date that decides which snapshot is the latest state.
    pub fn effective_date(&self) -> Option<&ChangeDate> {
        self.last_modified.as_ref().or(self.change_date.as_ref())
    }

    /// Change index with a missing value treated as zero.
    pub fn change_index_or_zero(&self) -> i64 {
        self.change_index.unwrap_or(0)
    }
}
