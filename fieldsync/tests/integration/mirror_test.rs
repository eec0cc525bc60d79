use fieldsync::checkpoint::MemoryCheckpointStore;
use fieldsync::mirror::{
    CapturingDestination, CollectionTags, MemoryWarehouse, MirrorWorker, RetryWorker, Warehouse,
};
use fieldsync::store::destination::MemoryDestination;
use fieldsync::store::staging::MemoryStaging;
use fieldsync::test_utils::faulty::{FaultyWarehouse, WarehouseFault};
use fieldsync::test_utils::fixtures::{config, p100_records};
use fieldsync::types::ChangeOperation;
use fieldsync_telemetry::tracing::init_test_tracing;

use crate::common::{create_pipeline, run_to_end};

#[tokio::test]
async fn committed_writes_are_mirrored() {
    init_test_tracing();
    let config = config("onemap");
    let tags = CollectionTags::from(&config.pipeline);
    let (destination, events) = CapturingDestination::wrap(MemoryDestination::new(), tags);
    let warehouse = MemoryWarehouse::new();
    let mut worker = MirrorWorker::new(warehouse.clone(), events);
    let pipeline = create_pipeline(
        &config,
        MemoryStaging::with_records(p100_records()),
        destination,
        MemoryCheckpointStore::new(),
    );

    run_to_end(&pipeline).await;
    let summary = worker.drain().await;

    assert_eq!(summary.applied, 3);
    assert_eq!(summary.failed, 0);
    let row = warehouse.projection("planned-poles", "P-100").await.unwrap();
    assert!(!row.is_deleted);
    assert_eq!(row.data.unwrap()["currentStatus"], "Pole Permission: Approved");
    let history_events = warehouse
        .events()
        .await
        .into_iter()
        .filter(|e| e.collection == "planned-poles/statusHistory")
        .collect::<Vec<_>>();
    assert_eq!(history_events.len(), 2);
    assert!(
        history_events
            .iter()
            .all(|e| e.operation == ChangeOperation::Create && e.entity_id.starts_with("P-100/"))
    );
}

#[tokio::test]
async fn failures_are_dead_lettered_after_three_retries() {
    init_test_tracing();
    let config = config("onemap");
    let tags = CollectionTags::from(&config.pipeline);
    let (destination, events) =
        CapturingDestination::wrap(MemoryDestination::new(), tags.clone());
    let warehouse = FaultyWarehouse::wrap(MemoryWarehouse::new());
    warehouse.inject(WarehouseFault::AlwaysFailApplies).await;
    let mut worker = MirrorWorker::new(warehouse.clone(), events);
    let pipeline = create_pipeline(
        &config,
        MemoryStaging::with_records(p100_records()),
        destination.clone(),
        MemoryCheckpointStore::new(),
    );

    run_to_end(&pipeline).await;
    let summary = worker.drain().await;
    assert_eq!(summary.failed, 3);

    let retry = RetryWorker::new(
        destination.inner().clone(),
        warehouse.clone(),
        tags,
        config.mirror.clone(),
    );
    for _ in 0..2 {
        let pass = retry.run_pass().await.unwrap();
        assert_eq!(pass.still_failing, 3);
        assert_eq!(pass.dead_lettered, 0);
    }
    let last = retry.run_pass().await.unwrap();

    assert_eq!(last.dead_lettered, 3);
    assert!(warehouse.failures().await.unwrap().is_empty());
    let dead_letters = warehouse.dead_letters().await.unwrap();
    assert_eq!(dead_letters.len(), 3);
    assert!(dead_letters.iter().all(|d| d.failure.retry_count == 3));
    assert_eq!(retry.run_pass().await.unwrap().examined, 0);
}

#[tokio::test]
async fn retry_applies_current_production_state() {
    init_test_tracing();
    let config = config("onemap");
    let tags = CollectionTags::from(&config.pipeline);
    let (destination, events) =
        CapturingDestination::wrap(MemoryDestination::new(), tags.clone());
    let warehouse = FaultyWarehouse::wrap(MemoryWarehouse::new());
    warehouse.inject(WarehouseFault::FailApplies(1)).await;
    let mut worker = MirrorWorker::new(warehouse.clone(), events);
    let pipeline = create_pipeline(
        &config,
        MemoryStaging::with_records(p100_records()),
        destination.clone(),
        MemoryCheckpointStore::new(),
    );

    run_to_end(&pipeline).await;
    let summary = worker.drain().await;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.applied, 2);

    let retry = RetryWorker::new(
        destination.inner().clone(),
        warehouse.clone(),
        tags,
        config.mirror.clone(),
    );
    let pass = retry.run_pass().await.unwrap();

    assert_eq!(pass.applied, 1);
    assert!(warehouse.failures().await.unwrap().is_empty());
    assert!(
        warehouse
            .inner()
            .projection("planned-poles", "P-100")
            .await
            .is_some()
    );
}
