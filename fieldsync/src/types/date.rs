use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use fieldsync_config::shared::DateOrderingConfig;
use serde::{Serialize, Serializer};

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// How change dates compare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateOrdering {
    /// Compare parsed instants. Unparseable dates sort before parseable ones.
    #[default]
    Parsed,
    /// Compare raw strings byte by byte.
    Lexicographic,
}

impl From<DateOrderingConfig> for DateOrdering {
    fn from(config: DateOrderingConfig) -> Self {
        match config {
            DateOrderingConfig::Parsed => DateOrdering::Parsed,
            DateOrderingConfig::Lexicographic => DateOrdering::Lexicographic,
        }
    }
}

/// A source date kept verbatim alongside its parsed UTC instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeDate {
    raw: String,
    instant: Option<DateTime<Utc>>,
}

impl ChangeDate {
    /// Parses `raw`, assuming UTC for formats without an offset.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let instant = parse_instant(raw.trim());

        Self { raw, instant }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.instant
    }

    /// Total order over change dates under `ordering`.
    pub fn cmp_with(&self, other: &ChangeDate, ordering: DateOrdering) -> Ordering {
        match ordering {
            DateOrdering::Lexicographic => self.raw.cmp(&other.raw),
            DateOrdering::Parsed => match (self.instant, other.instant) {
                (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.raw.cmp(&other.raw)),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => self.raw.cmp(&other.raw),
            },
        }
    }

    /// Whole days from `earlier` to `self` when both dates parse.
    pub fn days_since(&self, earlier: &ChangeDate) -> Option<i64> {
        let from = earlier.instant?;
        let to = self.instant?;

        Some((to - from).num_days())
    }
}

impl Serialize for ChangeDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Orders optional dates with a missing date first.
pub fn compare_optional_dates(
    a: Option<&ChangeDate>,
    b: Option<&ChangeDate>,
    ordering: DateOrdering,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp_with(b, ordering),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(raw, format) {
            return parsed.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}
