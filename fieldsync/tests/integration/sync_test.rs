use fieldsync::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use fieldsync::error::SyncResult;
use fieldsync::pipeline::{RunOptions, SyncPipeline};
use fieldsync::report::{Outcome, StopReason};
use fieldsync::store::destination::{DestinationStore, MemoryDestination};
use fieldsync::store::staging::{MemoryStaging, StagingStore};
use fieldsync::types::{PageCursor, StagingPage, StagingRecord, StatusFilter};
use fieldsync::test_utils::fixtures::{APPROVED, config, document, p100_records, record};
use fieldsync_telemetry::tracing::init_test_tracing;
use serde_json::{Value, json};

use crate::common::{approved_poles, create_pipeline, run_to_end};

#[tokio::test]
async fn p100_syncs_latest_state_and_collapsed_history() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let pipeline = create_pipeline(
        &config("onemap"),
        MemoryStaging::with_records(p100_records()),
        destination.clone(),
        MemoryCheckpointStore::new(),
    );

    let report = run_to_end(&pipeline).await;

    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert_eq!(report.totals.keys_synced, 1);
    assert_eq!(report.totals.history_entries_written, 2);

    let entity = destination.get_entity("P-100").await.unwrap().unwrap();
    assert_eq!(entity["currentStatus"], APPROVED);
    assert_eq!(entity["lastSyncedFrom"], "vf-onemap-data");
    assert_eq!(entity["totalStatusRecords"], 3);
    assert_eq!(entity["approvalDate"], "2025-01-02");

    let history = destination.history("P-100").await.unwrap();
    let transitions: Vec<(Value, Value)> = history
        .iter()
        .map(|e| (e.document["fromStatus"].clone(), e.document["toStatus"].clone()))
        .collect();
    assert_eq!(
        transitions,
        vec![
            (json!("Initial"), json!("Pole Permission: Requested")),
            (json!("Pole Permission: Requested"), json!(APPROVED)),
        ]
    );
    assert_eq!(history[1].document["daysInPreviousStatus"], 1);
}

#[tokio::test]
async fn second_run_writes_nothing() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let pipeline = create_pipeline(
        &config("onemap"),
        MemoryStaging::with_records(p100_records()),
        destination.clone(),
        MemoryCheckpointStore::new(),
    );

    run_to_end(&pipeline).await;
    let entities = destination.entities().await;

    let second = run_to_end(&pipeline).await;

    assert_eq!(second.totals.keys_synced, 0);
    assert_eq!(second.totals.batches_committed, 0);
    assert_eq!(second.totals.records_excluded, 2);
    assert_eq!(destination.entities().await, entities);
    assert_eq!(destination.count_history_entries().await.unwrap(), 2);
}

#[tokio::test]
async fn history_follows_change_dates_not_staging_ids() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let staging = MemoryStaging::with_records(vec![
        record(
            "001",
            json!({ "poleNumber": "P-5", "status": APPROVED, "dateStatusChanged": "2025-03-10" }),
        ),
        record(
            "002",
            json!({
                "poleNumber": "P-5",
                "status": "Pole Permission: Requested",
                "dateStatusChanged": "2025-03-01"
            }),
        ),
    ]);
    let pipeline = create_pipeline(
        &config("onemap"),
        staging,
        destination.clone(),
        MemoryCheckpointStore::new(),
    );

    run_to_end(&pipeline).await;

    let entity = destination.get_entity("P-5").await.unwrap().unwrap();
    assert_eq!(entity["currentStatus"], APPROVED);
    let history = destination.history("P-5").await.unwrap();
    assert_eq!(history[0].document["toStatus"], "Pole Permission: Requested");
    assert_eq!(history[1].document["toStatus"], APPROVED);
    assert_eq!(history[1].document["daysInPreviousStatus"], 9);
}

#[tokio::test]
async fn identical_staging_produces_identical_documents() {
    init_test_tracing();
    let mut results = Vec::new();

    for _ in 0..2 {
        let destination = MemoryDestination::new();
        let pipeline = create_pipeline(
            &config("onemap"),
            MemoryStaging::with_records(p100_records()),
            destination.clone(),
            MemoryCheckpointStore::new(),
        );
        run_to_end(&pipeline).await;

        let mut entity = destination.get_entity("P-100").await.unwrap().unwrap();
        entity.remove("lastSyncDate");
        let history = destination.history("P-100").await.unwrap();
        results.push((entity, history));
    }

    assert_eq!(results[0], results[1]);
}

#[tokio::test]
async fn entities_owned_by_other_writers_are_left_untouched() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let manual = document(json!({ "poleNumber": "P-100", "lastSyncedFrom": "manual" }));
    destination.insert_entity("P-100", manual.clone()).await;
    let pipeline = create_pipeline(
        &config("onemap"),
        MemoryStaging::with_records(p100_records()),
        destination.clone(),
        MemoryCheckpointStore::new(),
    );

    let report = run_to_end(&pipeline).await;

    assert_eq!(report.totals.conflicts, 1);
    let conflict = report.outcomes_of(Outcome::Conflict).next().unwrap();
    assert_eq!(conflict.natural_key, "P-100");
    assert!(conflict.detail.contains("manual"));
    assert_eq!(destination.get_entity("P-100").await.unwrap(), Some(manual));
    assert_eq!(destination.count_history_entries().await.unwrap(), 0);
}

#[tokio::test]
async fn records_without_a_key_are_reported() {
    init_test_tracing();
    let mut records = approved_poles(1);
    records.push(record(
        "900",
        json!({ "status": APPROVED, "importBatch": "batch-7" }),
    ));
    let destination = MemoryDestination::new();
    let pipeline = create_pipeline(
        &config("onemap"),
        MemoryStaging::with_records(records),
        destination.clone(),
        MemoryCheckpointStore::new(),
    );

    let report = run_to_end(&pipeline).await;

    assert_eq!(report.totals.keys_synced, 1);
    assert_eq!(report.totals.missing_keys, 1);
    let missing = report.outcomes_of(Outcome::MissingKey).next().unwrap();
    assert!(missing.natural_key.is_empty());
    assert!(missing.detail.contains("900"));
    assert!(missing.detail.contains("batch-7"));
}

#[tokio::test]
async fn dry_run_classifies_without_writing() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let checkpoints = MemoryCheckpointStore::new();
    let pipeline = create_pipeline(
        &config("onemap"),
        MemoryStaging::with_records(approved_poles(3)),
        destination.clone(),
        checkpoints.clone(),
    );

    let report = pipeline
        .run(&RunOptions {
            dry_run: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.outcomes_of(Outcome::WouldSync).count(), 3);
    assert_eq!(report.totals.batches_committed, 0);
    assert_eq!(destination.count_entities().await.unwrap(), 0);
    assert!(checkpoints.load("onemap").await.unwrap().is_none());
}

#[tokio::test]
async fn oversized_histories_are_split_across_batches() {
    init_test_tracing();
    let mut config = config("onemap");
    config.batch.max_operations = 4;
    let records = (0..6)
        .map(|i| {
            let status = if i == 5 {
                APPROVED.to_string()
            } else {
                format!("Step {i}")
            };
            record(
                &format!("{i:03}"),
                json!({
                    "poleNumber": "P-200",
                    "status": status,
                    "dateStatusChanged": format!("2025-04-{:02}", i + 1),
                }),
            )
        })
        .collect::<Vec<_>>();
    let destination = MemoryDestination::new();
    let pipeline = create_pipeline(
        &config,
        MemoryStaging::with_records(records),
        destination.clone(),
        MemoryCheckpointStore::new(),
    );

    let report = run_to_end(&pipeline).await;

    assert!(report.totals.batches_committed >= 2);
    assert_eq!(report.totals.keys_synced, 1);
    assert_eq!(destination.history("P-200").await.unwrap().len(), 6);
    let entity = destination.get_entity("P-200").await.unwrap().unwrap();
    assert_eq!(entity["currentStatus"], APPROVED);
}

/// Staging whose per-key lookups come back empty, as when records vanish mid-run.
#[derive(Debug, Clone)]
struct EmptyKeyLookups(MemoryStaging);

impl StagingStore for EmptyKeyLookups {
    async fn fetch_page(
        &self,
        filter: &StatusFilter,
        after: Option<&PageCursor>,
        limit: usize,
    ) -> SyncResult<StagingPage> {
        self.0.fetch_page(filter, after, limit).await
    }

    async fn records_for_key(
        &self,
        _key_fields: &[String],
        _key: &str,
    ) -> SyncResult<Vec<StagingRecord>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn keys_without_resolvable_snapshots_are_reported() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let pipeline = SyncPipeline::new(
        &config("onemap"),
        EmptyKeyLookups(MemoryStaging::with_records(approved_poles(2))),
        destination.clone(),
        MemoryCheckpointStore::new(),
    )
    .unwrap();

    let report = pipeline.run(&RunOptions::default()).await.unwrap();

    assert_eq!(report.totals.keys_synced, 0);
    assert_eq!(report.totals.missing_keys, 2);
    let keys: Vec<_> = report
        .outcomes_of(Outcome::MissingKey)
        .map(|o| o.natural_key.as_str())
        .collect();
    assert_eq!(keys, vec!["P-1", "P-2"]);
    assert_eq!(destination.count_entities().await.unwrap(), 0);
}
