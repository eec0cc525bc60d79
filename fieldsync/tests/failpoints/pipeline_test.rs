use fieldsync::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use fieldsync::failpoints::{COMMIT_BEFORE_BATCH, MIRROR_BEFORE_APPLY};
use fieldsync::mirror::{
    CapturingDestination, CollectionTags, MemoryWarehouse, MirrorWorker, Warehouse,
};
use fieldsync::pipeline::{RunOptions, SyncPipeline};
use fieldsync::report::StopReason;
use fieldsync::store::destination::{DestinationStore, MemoryDestination};
use fieldsync::store::staging::MemoryStaging;
use fieldsync::test_utils::failpoints::CustomFailScenario;
use fieldsync::test_utils::fixtures::{config, p100_records};
use fieldsync_telemetry::tracing::init_test_tracing;

#[tokio::test]
async fn single_rejected_commit_is_retried() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(COMMIT_BEFORE_BATCH, "1*return")]);
    let destination = MemoryDestination::new();
    let pipeline = SyncPipeline::new(
        &config("onemap"),
        MemoryStaging::with_records(p100_records()),
        destination.clone(),
        MemoryCheckpointStore::new(),
    )
    .unwrap();

    let report = pipeline.run(&RunOptions::default()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.totals.keys_synced, 1);
    assert_eq!(destination.count_history_entries().await.unwrap(), 2);
}

#[tokio::test]
async fn repeatedly_rejected_commit_writes_nothing() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(COMMIT_BEFORE_BATCH, "2*return")]);
    let destination = MemoryDestination::new();
    let checkpoints = MemoryCheckpointStore::new();
    let pipeline = SyncPipeline::new(
        &config("onemap"),
        MemoryStaging::with_records(p100_records()),
        destination.clone(),
        checkpoints.clone(),
    )
    .unwrap();

    let report = pipeline.run(&RunOptions::default()).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::CommitFailure);
    assert_eq!(destination.count_entities().await.unwrap(), 0);
    assert_eq!(destination.count_history_entries().await.unwrap(), 0);
    let checkpoint = checkpoints.load("onemap").await.unwrap().unwrap();
    assert!(checkpoint.is_running());
    assert_eq!(checkpoint.keys_committed, 0);
}

#[tokio::test]
async fn mirror_failures_do_not_fail_the_sync() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(MIRROR_BEFORE_APPLY, "return(warehouse)")]);
    let config = config("onemap");
    let (destination, events) = CapturingDestination::wrap(
        MemoryDestination::new(),
        CollectionTags::from(&config.pipeline),
    );
    let warehouse = MemoryWarehouse::new();
    let mut worker = MirrorWorker::new(warehouse.clone(), events);
    let pipeline = SyncPipeline::new(
        &config,
        MemoryStaging::with_records(p100_records()),
        destination.clone(),
        MemoryCheckpointStore::new(),
    )
    .unwrap();

    let report = pipeline.run(&RunOptions::default()).await.unwrap();
    let summary = worker.drain().await;

    assert!(report.is_success());
    assert_eq!(destination.inner().count_entities().await.unwrap(), 1);
    assert_eq!(summary.failed, 3);
    assert_eq!(warehouse.failures().await.unwrap().len(), 3);
    assert_eq!(warehouse.event_count().await.unwrap(), 0);
}
