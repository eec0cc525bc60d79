use fieldsync_config::shared::StatusFilterConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object as stored in the staging and destination stores.
pub type Document = Map<String, Value>;

/// A raw record read from the staging store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingRecord {
    /// Staging primary key. Record ids order ingestion.
    pub id: String,
    pub attributes: Document,
}

impl StagingRecord {
    pub fn new(id: impl Into<String>, attributes: Document) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    /// Returns the attribute rendered as a trimmed string, if it is a non-empty scalar.
    pub fn attribute_str(&self, field: &str) -> Option<String> {
        scalar_to_string(self.attributes.get(field)?)
    }
}

/// Renders a string, number or boolean as a trimmed, non-empty string.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    let rendered = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };

    if rendered.is_empty() {
        None
    } else {
        Some(rendered)
    }
}

/// Opaque position in the staging primary key order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(last_id: impl Into<String>) -> Self {
        Self(last_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Status predicate that nominates candidate records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFilter {
    pub field: String,
    pub values: Vec<String>,
}

impl StatusFilter {
    pub fn matches(&self, record: &StagingRecord) -> bool {
        record
            .attribute_str(&self.field)
            .is_some_and(|value| self.values.iter().any(|v| *v == value))
    }
}

impl From<&StatusFilterConfig> for StatusFilter {
    fn from(config: &StatusFilterConfig) -> Self {
        Self {
            field: config.field.clone(),
            values: config.values.clone(),
        }
    }
}

/// A page of staging records in primary key order.
#[derive(Debug, Clone, Default)]
pub struct StagingPage {
    pub records: Vec<StagingRecord>,
    /// Cursor for the following page, [`None`] once staging is exhausted.
    pub next_cursor: Option<PageCursor>,
}

/// Merges `patch` into `target`, recursing into nested objects.
///
/// Non object values in `patch` replace whatever `target` holds.
pub fn deep_merge(target: &mut Document, patch: Document) {
    for (key, value) in patch {
        let incoming = match value {
            Value::Object(incoming) => incoming,
            other => {
                target.insert(key, other);
                continue;
            }
        };

        if let Some(Value::Object(existing)) = target.get_mut(&key) {
            deep_merge(existing, incoming);
            continue;
        }
        target.insert(key, Value::Object(incoming));
    }
}
