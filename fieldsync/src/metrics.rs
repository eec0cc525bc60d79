//! Metric names and labels emitted through the `metrics` facade.

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};

/// Label for the pipeline name.
pub const PIPELINE_LABEL: &str = "pipeline";

/// Label for a per-key outcome.
pub const OUTCOME_LABEL: &str = "outcome";

/// Label for a mirror event's collection tag.
pub const COLLECTION_LABEL: &str = "collection";

/// Counter for staging snapshots read while building entities.
pub const FIELDSYNC_SNAPSHOTS_READ_TOTAL: &str = "fieldsync_snapshots_read_total";

/// Counter for natural keys processed, labelled by outcome.
pub const FIELDSYNC_KEYS_TOTAL: &str = "fieldsync_keys_total";

/// Counter for history entries written.
pub const FIELDSYNC_HISTORY_ENTRIES_WRITTEN_TOTAL: &str =
    "fieldsync_history_entries_written_total";

/// Counter for committed batches.
pub const FIELDSYNC_BATCHES_COMMITTED_TOTAL: &str = "fieldsync_batches_committed_total";

/// Counter for rejected batch commit attempts.
pub const FIELDSYNC_BATCH_COMMIT_FAILURES_TOTAL: &str = "fieldsync_batch_commit_failures_total";

/// Histogram for the duration of one batch commit.
pub const FIELDSYNC_BATCH_COMMIT_DURATION_SECONDS: &str =
    "fieldsync_batch_commit_duration_seconds";

/// Counter for fully processed staging pages.
pub const FIELDSYNC_PAGES_COMPLETED_TOTAL: &str = "fieldsync_pages_completed_total";

/// Counter for change events applied to the warehouse.
pub const FIELDSYNC_MIRROR_EVENTS_APPLIED_TOTAL: &str = "fieldsync_mirror_events_applied_total";

/// Counter for change events that failed to apply.
pub const FIELDSYNC_MIRROR_FAILURES_TOTAL: &str = "fieldsync_mirror_failures_total";

/// Counter for failures moved to dead-letter storage.
pub const FIELDSYNC_MIRROR_DEAD_LETTERS_TOTAL: &str = "fieldsync_mirror_dead_letters_total";

/// Gauge for staging keys missing from the destination at the last audit.
pub const FIELDSYNC_UNSYNCED_KEYS: &str = "fieldsync_unsynced_keys";

/// Registers descriptions for every metric with the installed recorder, if any.
pub fn register_metrics() {
    describe_counter!(
        FIELDSYNC_SNAPSHOTS_READ_TOTAL,
        Unit::Count,
        "Staging snapshots read while building entities."
    );
    describe_counter!(
        FIELDSYNC_KEYS_TOTAL,
        Unit::Count,
        "Natural keys processed, labelled by outcome."
    );
    describe_counter!(
        FIELDSYNC_HISTORY_ENTRIES_WRITTEN_TOTAL,
        Unit::Count,
        "History entries written to the destination."
    );
    describe_counter!(
        FIELDSYNC_BATCHES_COMMITTED_TOTAL,
        Unit::Count,
        "Atomic write batches committed."
    );
    describe_counter!(
        FIELDSYNC_BATCH_COMMIT_FAILURES_TOTAL,
        Unit::Count,
        "Rejected batch commit attempts."
    );
    describe_histogram!(
        FIELDSYNC_BATCH_COMMIT_DURATION_SECONDS,
        Unit::Seconds,
        "Time taken to commit one batch."
    );
    describe_counter!(
        FIELDSYNC_PAGES_COMPLETED_TOTAL,
        Unit::Count,
        "Staging pages fully processed."
    );
    describe_counter!(
        FIELDSYNC_MIRROR_EVENTS_APPLIED_TOTAL,
        Unit::Count,
        "Change events applied to the warehouse."
    );
    describe_counter!(
        FIELDSYNC_MIRROR_FAILURES_TOTAL,
        Unit::Count,
        "Change events that failed to apply."
    );
    describe_counter!(
        FIELDSYNC_MIRROR_DEAD_LETTERS_TOTAL,
        Unit::Count,
        "Failures moved to dead-letter storage."
    );
    describe_gauge!(
        FIELDSYNC_UNSYNCED_KEYS,
        Unit::Count,
        "Staging keys missing from the destination at the last audit."
    );
}
