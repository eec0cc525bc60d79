use fieldsync::checkpoint::MemoryCheckpointStore;
use fieldsync::pipeline::{RunOptions, SyncPipeline};
use fieldsync::report::RunReport;
use fieldsync::store::destination::DestinationStore;
use fieldsync::store::staging::MemoryStaging;
use fieldsync::test_utils::fixtures::{APPROVED, record};
use fieldsync::types::StagingRecord;
use fieldsync_config::shared::FieldsyncConfig;
use serde_json::json;

pub type TestPipeline<D> = SyncPipeline<MemoryStaging, D, MemoryCheckpointStore>;

pub fn create_pipeline<D>(
    config: &FieldsyncConfig,
    staging: MemoryStaging,
    destination: D,
    checkpoints: MemoryCheckpointStore,
) -> TestPipeline<D>
where
    D: DestinationStore + Clone + Send + Sync,
{
    SyncPipeline::new(config, staging, destination, checkpoints).unwrap()
}

pub async fn run_to_end<D>(pipeline: &TestPipeline<D>) -> RunReport
where
    D: DestinationStore + Clone + Send + Sync,
{
    pipeline.run(&RunOptions::default()).await.unwrap()
}

/// One approved snapshot per key, with staging ids `001`, `002`, ...
pub fn approved_poles(count: usize) -> Vec<StagingRecord> {
    (1..=count)
        .map(|i| {
            record(
                &format!("{i:03}"),
                json!({
                    "poleNumber": format!("P-{i}"),
                    "status": APPROVED,
                    "dateStatusChanged": "2025-02-01",
                }),
            )
        })
        .collect()
}
