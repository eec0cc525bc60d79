use fieldsync::audit::CompletenessAuditor;
use fieldsync::checkpoint::MemoryCheckpointStore;
use fieldsync::monitor::StatusMonitor;
use fieldsync::store::destination::MemoryDestination;
use fieldsync::store::staging::MemoryStaging;
use fieldsync::test_utils::fixtures::{config, document};
use fieldsync_telemetry::tracing::init_test_tracing;
use serde_json::json;

use crate::common::{approved_poles, create_pipeline, run_to_end};

#[tokio::test]
async fn audit_is_complete_after_a_full_run() {
    init_test_tracing();
    let config = config("onemap");
    let staging = MemoryStaging::with_records(approved_poles(5));
    let destination = MemoryDestination::new();
    let pipeline = create_pipeline(
        &config,
        staging.clone(),
        destination.clone(),
        MemoryCheckpointStore::new(),
    );
    let auditor = CompletenessAuditor::new(&config, staging, destination);

    let before = auditor.audit(3).await.unwrap();
    assert_eq!(before.unsynced, 5);
    assert_eq!(before.unsynced_sample, vec!["P-1", "P-2", "P-3"]);

    run_to_end(&pipeline).await;
    let after = auditor.audit(3).await.unwrap();

    assert!(after.is_complete());
    assert_eq!(after.staging_keys, 5);
    assert_eq!(after.destination_keys, 5);
    assert_eq!(after.orphaned, 0);
}

#[tokio::test]
async fn conflicts_remain_visible_as_unsynced() {
    init_test_tracing();
    let config = config("onemap");
    let staging = MemoryStaging::with_records(approved_poles(3));
    let destination = MemoryDestination::new();
    destination
        .insert_entity("P-2", document(json!({ "lastSyncedFrom": "manual" })))
        .await;
    let checkpoints = MemoryCheckpointStore::new();
    let pipeline = create_pipeline(
        &config,
        staging.clone(),
        destination.clone(),
        checkpoints.clone(),
    );

    let report = run_to_end(&pipeline).await;
    let audit = CompletenessAuditor::new(&config, staging, destination.clone())
        .audit(10)
        .await
        .unwrap();
    let snapshot = StatusMonitor::new(destination, checkpoints, "onemap", "vf-onemap-data")
        .snapshot()
        .await
        .unwrap();

    assert_eq!(report.totals.conflicts, 1);
    assert_eq!(audit.unsynced_sample, vec!["P-2"]);
    assert_eq!(snapshot.entities, 3);
    assert_eq!(snapshot.tagged_entities, 2);
    assert_eq!(snapshot.checkpoint.unwrap().keys_committed, 2);
}
