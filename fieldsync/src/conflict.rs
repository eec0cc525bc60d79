//! Classifies natural keys against what the destination already holds.

use serde::Serialize;

use crate::concurrency::fanout::try_fan_out;
use crate::error::SyncResult;
use crate::store::destination::DestinationStore;
use crate::types::Document;

/// Field on destination entities naming the pipeline that last wrote them.
pub const LAST_SYNCED_FROM: &str = "lastSyncedFrom";

/// Where a natural key stands relative to the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConflictOutcome {
    /// No entity exists for the key.
    New,
    /// An entity written by this pipeline exists.
    AlreadySynced,
    /// An entity exists that this pipeline did not write. It is never overwritten.
    PreExistingConflict { existing_source: Option<String> },
}

impl ConflictOutcome {
    pub fn is_writable(&self) -> bool {
        matches!(self, ConflictOutcome::New)
    }
}

/// Classifies one key from its destination document.
pub fn classify_document(existing: Option<&Document>, source_tag: &str) -> ConflictOutcome {
    let Some(existing) = existing else {
        return ConflictOutcome::New;
    };

    let existing_source = existing
        .get(LAST_SYNCED_FROM)
        .and_then(|value| value.as_str());

    if existing_source == Some(source_tag) {
        ConflictOutcome::AlreadySynced
    } else {
        ConflictOutcome::PreExistingConflict {
            existing_source: existing_source.map(str::to_string),
        }
    }
}

/// Looks up destination entities with bounded concurrency.
#[derive(Debug, Clone)]
pub struct ConflictDetector<D> {
    destination: D,
    source_tag: String,
    max_concurrent_lookups: usize,
}

impl<D> ConflictDetector<D>
where
    D: DestinationStore + Clone + Send + Sync,
{
    pub fn new(
        destination: D,
        source_tag: impl Into<String>,
        max_concurrent_lookups: usize,
    ) -> Self {
        Self {
            destination,
            source_tag: source_tag.into(),
            max_concurrent_lookups,
        }
    }

    pub async fn classify(&self, natural_key: &str) -> SyncResult<ConflictOutcome> {
        let existing = self.destination.get_entity(natural_key).await?;

        Ok(classify_document(existing.as_ref(), &self.source_tag))
    }

    /// Classifies every key, returning outcomes in input order.
    pub async fn classify_all(&self, keys: &[String]) -> SyncResult<Vec<ConflictOutcome>> {
        try_fan_out(keys, self.max_concurrent_lookups, |key| self.classify(key)).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::destination::MemoryDestination;
    use crate::test_utils::fixtures::document;

    const TAG: &str = "vf-onemap-data";

    #[test]
    fn classifies_by_source_tag() {
        let ours = document(json!({ LAST_SYNCED_FROM: TAG }));
        let theirs = document(json!({ LAST_SYNCED_FROM: "manual-import" }));
        let untagged = document(json!({ "poleNumber": "P-1" }));

        assert_eq!(classify_document(None, TAG), ConflictOutcome::New);
        assert_eq!(
            classify_document(Some(&ours), TAG),
            ConflictOutcome::AlreadySynced
        );
        assert_eq!(
            classify_document(Some(&theirs), TAG),
            ConflictOutcome::PreExistingConflict {
                existing_source: Some("manual-import".to_string())
            }
        );
        assert_eq!(
            classify_document(Some(&untagged), TAG),
            ConflictOutcome::PreExistingConflict {
                existing_source: None
            }
        );
    }

    #[tokio::test]
    async fn classify_all_keeps_key_order() {
        let destination = MemoryDestination::new();
        destination
            .insert_entity("P-2", document(json!({ LAST_SYNCED_FROM: TAG })))
            .await;
        destination
            .insert_entity("P-3", document(json!({ "poleNumber": "P-3" })))
            .await;
        let detector = ConflictDetector::new(destination, TAG, 2);

        let keys = vec!["P-1".to_string(), "P-2".to_string(), "P-3".to_string()];
        let outcomes = detector.classify_all(&keys).await.unwrap();

        assert_eq!(outcomes[0], ConflictOutcome::New);
        assert_eq!(outcomes[1], ConflictOutcome::AlreadySynced);
        assert!(!outcomes[2].is_writable());
    }
}
