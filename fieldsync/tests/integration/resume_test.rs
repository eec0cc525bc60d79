use fieldsync::checkpoint::{CheckpointStatus, CheckpointStore, MemoryCheckpointStore};
use fieldsync::pipeline::RunOptions;
use fieldsync::report::StopReason;
use fieldsync::store::destination::{DestinationStore, MemoryDestination};
use fieldsync::store::staging::MemoryStaging;
use fieldsync::test_utils::faulty::{FaultyDestination, WriteFault};
use fieldsync::test_utils::fixtures::config;
use fieldsync_telemetry::tracing::init_test_tracing;

use crate::common::{approved_poles, create_pipeline, run_to_end};

#[tokio::test]
async fn commit_failure_stops_the_run_and_the_next_run_resumes() {
    init_test_tracing();
    let mut config = config("onemap");
    // One key per batch.
    config.batch.max_operations = 2;
    let destination = FaultyDestination::wrap(MemoryDestination::new());
    destination
        .inject(WriteFault::FailCommitsAfter {
            successes: 2,
            failures: 2,
        })
        .await;
    let checkpoints = MemoryCheckpointStore::new();
    let pipeline = create_pipeline(
        &config,
        MemoryStaging::with_records(approved_poles(4)),
        destination.clone(),
        checkpoints.clone(),
    );

    let failed = run_to_end(&pipeline).await;

    assert_eq!(failed.stop_reason, StopReason::CommitFailure);
    assert!(!failed.is_success());
    assert!(failed.error.is_some());
    assert_eq!(failed.totals.keys_synced, 2);
    assert_eq!(destination.inner().count_entities().await.unwrap(), 2);

    let checkpoint = checkpoints.load("onemap").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, CheckpointStatus::Running);
    assert_eq!(checkpoint.keys_committed, 2);
    assert_eq!(checkpoint.cursor, None);

    let resumed = run_to_end(&pipeline).await;

    assert!(resumed.resumed);
    assert_eq!(resumed.run_id, failed.run_id);
    assert_eq!(resumed.stop_reason, StopReason::Exhausted);
    assert_eq!(resumed.totals.keys_synced, 2);
    assert_eq!(resumed.totals.records_excluded, 2);
    assert_eq!(destination.inner().count_entities().await.unwrap(), 4);
    assert_eq!(destination.inner().count_history_entries().await.unwrap(), 4);
}

#[tokio::test]
async fn page_limit_leaves_a_resumable_checkpoint() {
    init_test_tracing();
    let mut config = config("onemap");
    config.sync.page_size = 2;
    let destination = MemoryDestination::new();
    let checkpoints = MemoryCheckpointStore::new();
    let pipeline = create_pipeline(
        &config,
        MemoryStaging::with_records(approved_poles(4)),
        destination.clone(),
        checkpoints.clone(),
    );

    let first = pipeline
        .run(&RunOptions {
            max_pages: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(first.stop_reason, StopReason::PageLimit);
    assert_eq!(first.totals.keys_synced, 2);
    let checkpoint = checkpoints.load("onemap").await.unwrap().unwrap();
    assert!(checkpoint.is_running());
    assert_eq!(checkpoint.cursor.as_ref().map(|c| c.as_str()), Some("002"));

    let second = run_to_end(&pipeline).await;

    assert!(second.resumed);
    assert_eq!(second.stop_reason, StopReason::Exhausted);
    assert_eq!(second.totals.keys_synced, 2);
    assert_eq!(destination.count_entities().await.unwrap(), 4);
    let checkpoint = checkpoints.load("onemap").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, CheckpointStatus::Completed);
    assert_eq!(checkpoint.keys_committed, 4);
}

#[tokio::test]
async fn exhausted_time_budget_stops_before_reading() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let pipeline = create_pipeline(
        &config("onemap"),
        MemoryStaging::with_records(approved_poles(2)),
        destination.clone(),
        MemoryCheckpointStore::new(),
    );

    let report = pipeline
        .run(&RunOptions {
            max_runtime: Some(std::time::Duration::ZERO),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::TimeBudget);
    assert_eq!(report.totals.records_read, 0);
    assert_eq!(destination.count_entities().await.unwrap(), 0);
}
