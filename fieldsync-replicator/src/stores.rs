//! Store backends selected at runtime from [`StoreConfig`].
//!
//! Each enum forwards to the memory or Postgres implementation of its store.

use chrono::{DateTime, Utc};
use fieldsync::checkpoint::{
    Checkpoint, CheckpointStore, MemoryCheckpointStore, PostgresCheckpointStore,
};
use fieldsync::error::SyncResult;
use fieldsync::mirror::{MemoryWarehouse, PostgresWarehouse, Warehouse};
use fieldsync::store::destination::{
    DestinationStore, MemoryDestination, PostgresDestination, StoredHistoryEntry,
};
use fieldsync::store::staging::{MemoryStaging, PostgresStaging, StagingStore};
use fieldsync::types::{
    ChangeEvent, DeadLetterRecord, Document, PageCursor, StagingPage, StagingRecord,
    StatusFilter, SyncFailure, WriteBatch,
};
use fieldsync_config::shared::{FieldsyncConfig, PgConnectionConfig, StoreConfig};
use fieldsync_postgres::db::{DEFAULT_MAX_CONNECTIONS, connect_to_store};
use fieldsync_postgres::migrations::apply_migrations;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ReplicatorResult;

#[derive(Debug, Clone)]
pub enum StagingBackend {
    Memory(MemoryStaging),
    Postgres(PostgresStaging),
}

impl StagingStore for StagingBackend {
    async fn fetch_page(
        &self,
        filter: &StatusFilter,
        after: Option<&PageCursor>,
        limit: usize,
    ) -> SyncResult<StagingPage> {
        match self {
            StagingBackend::Memory(store) => store.fetch_page(filter, after, limit).await,
            StagingBackend::Postgres(store) => store.fetch_page(filter, after, limit).await,
        }
    }

    async fn records_for_key(
        &self,
        key_fields: &[String],
        key: &str,
    ) -> SyncResult<Vec<StagingRecord>> {
        match self {
            StagingBackend::Memory(store) => store.records_for_key(key_fields, key).await,
            StagingBackend::Postgres(store) => store.records_for_key(key_fields, key).await,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DestinationBackend {
    Memory(MemoryDestination),
    Postgres(PostgresDestination),
}

impl DestinationStore for DestinationBackend {
    fn name(&self) -> &'static str {
        match self {
            DestinationBackend::Memory(store) => store.name(),
            DestinationBackend::Postgres(store) => store.name(),
        }
    }

    async fn get_entity(&self, natural_key: &str) -> SyncResult<Option<Document>> {
        match self {
            DestinationBackend::Memory(store) => store.get_entity(natural_key).await,
            DestinationBackend::Postgres(store) => store.get_entity(natural_key).await,
        }
    }

    async fn keys_by_source(&self, source_tag: &str) -> SyncResult<Vec<String>> {
        match self {
            DestinationBackend::Memory(store) => store.keys_by_source(source_tag).await,
            DestinationBackend::Postgres(store) => store.keys_by_source(source_tag).await,
        }
    }

    async fn count_entities(&self) -> SyncResult<u64> {
        match self {
            DestinationBackend::Memory(store) => store.count_entities().await,
            DestinationBackend::Postgres(store) => store.count_entities().await,
        }
    }

    async fn count_history_entries(&self) -> SyncResult<u64> {
        match self {
            DestinationBackend::Memory(store) => store.count_history_entries().await,
            DestinationBackend::Postgres(store) => store.count_history_entries().await,
        }
    }

    async fn history(&self, natural_key: &str) -> SyncResult<Vec<StoredHistoryEntry>> {
        match self {
            DestinationBackend::Memory(store) => store.history(natural_key).await,
            DestinationBackend::Postgres(store) => store.history(natural_key).await,
        }
    }

    async fn get_history_entry(
        &self,
        natural_key: &str,
        entry_id: &str,
    ) -> SyncResult<Option<StoredHistoryEntry>> {
        match self {
            DestinationBackend::Memory(store) => {
                store.get_history_entry(natural_key, entry_id).await
            }
            DestinationBackend::Postgres(store) => {
                store.get_history_entry(natural_key, entry_id).await
            }
        }
    }

    async fn commit(&self, batch: &WriteBatch) -> SyncResult<()> {
        match self {
            DestinationBackend::Memory(store) => store.commit(batch).await,
            DestinationBackend::Postgres(store) => store.commit(batch).await,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CheckpointBackend {
    Memory(MemoryCheckpointStore),
    Postgres(PostgresCheckpointStore),
}

impl CheckpointStore for CheckpointBackend {
    async fn load(&self, pipeline: &str) -> SyncResult<Option<Checkpoint>> {
        match self {
            CheckpointBackend::Memory(store) => store.load(pipeline).await,
            CheckpointBackend::Postgres(store) => store.load(pipeline).await,
        }
    }

    async fn save(&self, checkpoint: &Checkpoint) -> SyncResult<()> {
        match self {
            CheckpointBackend::Memory(store) => store.save(checkpoint).await,
            CheckpointBackend::Postgres(store) => store.save(checkpoint).await,
        }
    }
}

#[derive(Debug, Clone)]
pub enum WarehouseBackend {
    Memory(MemoryWarehouse),
    Postgres(PostgresWarehouse),
}

impl Warehouse for WarehouseBackend {
    async fn apply_event(&self, event: &ChangeEvent) -> SyncResult<()> {
        match self {
            WarehouseBackend::Memory(store) => store.apply_event(event).await,
            WarehouseBackend::Postgres(store) => store.apply_event(event).await,
        }
    }

    async fn record_failure(&self, failure: &SyncFailure) -> SyncResult<()> {
        match self {
            WarehouseBackend::Memory(store) => store.record_failure(failure).await,
            WarehouseBackend::Postgres(store) => store.record_failure(failure).await,
        }
    }

    async fn retryable_failures(
        &self,
        created_after: DateTime<Utc>,
        max_attempts: u32,
        limit: usize,
    ) -> SyncResult<Vec<SyncFailure>> {
        match self {
            WarehouseBackend::Memory(store) => {
                store
                    .retryable_failures(created_after, max_attempts, limit)
                    .await
            }
            WarehouseBackend::Postgres(store) => {
                store
                    .retryable_failures(created_after, max_attempts, limit)
                    .await
            }
        }
    }

    async fn remove_failure(&self, id: Uuid) -> SyncResult<()> {
        match self {
            WarehouseBackend::Memory(store) => store.remove_failure(id).await,
            WarehouseBackend::Postgres(store) => store.remove_failure(id).await,
        }
    }

    async fn dead_letter(&self, failure: &SyncFailure) -> SyncResult<()> {
        match self {
            WarehouseBackend::Memory(store) => store.dead_letter(failure).await,
            WarehouseBackend::Postgres(store) => store.dead_letter(failure).await,
        }
    }

    async fn failures(&self) -> SyncResult<Vec<SyncFailure>> {
        match self {
            WarehouseBackend::Memory(store) => store.failures().await,
            WarehouseBackend::Postgres(store) => store.failures().await,
        }
    }

    async fn dead_letters(&self) -> SyncResult<Vec<DeadLetterRecord>> {
        match self {
            WarehouseBackend::Memory(store) => store.dead_letters().await,
            WarehouseBackend::Postgres(store) => store.dead_letters().await,
        }
    }

    async fn event_count(&self) -> SyncResult<u64> {
        match self {
            WarehouseBackend::Memory(store) => store.event_count().await,
            WarehouseBackend::Postgres(store) => store.event_count().await,
        }
    }
}

/// Every store a command may need.
#[derive(Debug, Clone)]
pub struct Stores {
    pub staging: StagingBackend,
    pub destination: DestinationBackend,
    /// Checkpoints live next to the destination.
    pub checkpoints: CheckpointBackend,
    pub warehouse: Option<WarehouseBackend>,
}

impl Stores {
    /// Connects to, migrates or seeds every configured store.
    pub async fn from_config(config: &FieldsyncConfig) -> ReplicatorResult<Self> {
        let staging = match &config.staging {
            StoreConfig::Memory { seed_path } => {
                let store = match seed_path {
                    Some(path) => MemoryStaging::from_json_file(path).await?,
                    None => {
                        warn!("staging is an empty in-memory store");
                        MemoryStaging::new()
                    }
                };
                StagingBackend::Memory(store)
            }
            StoreConfig::Postgres { connection } => {
                StagingBackend::Postgres(PostgresStaging::new(connect(connection).await?))
            }
        };

        let (destination, checkpoints) = match &config.destination {
            StoreConfig::Memory { .. } => (
                DestinationBackend::Memory(MemoryDestination::new()),
                CheckpointBackend::Memory(MemoryCheckpointStore::new()),
            ),
            StoreConfig::Postgres { connection } => {
                let pool = connect(connection).await?;
                (
                    DestinationBackend::Postgres(PostgresDestination::new(pool.clone())),
                    CheckpointBackend::Postgres(PostgresCheckpointStore::new(pool)),
                )
            }
        };

        let warehouse = match &config.warehouse {
            None => None,
            Some(StoreConfig::Memory { .. }) => {
                Some(WarehouseBackend::Memory(MemoryWarehouse::new()))
            }
            Some(StoreConfig::Postgres { connection }) => Some(WarehouseBackend::Postgres(
                PostgresWarehouse::new(connect(connection).await?),
            )),
        };

        info!(
            staging = kind(&config.staging),
            destination = kind(&config.destination),
            warehouse = config.warehouse.as_ref().map(kind),
            "stores initialized"
        );

        Ok(Self {
            staging,
            destination,
            checkpoints,
            warehouse,
        })
    }
}

async fn connect(connection: &PgConnectionConfig) -> ReplicatorResult<PgPool> {
    apply_migrations(connection).await?;
    let pool = connect_to_store(connection, DEFAULT_MAX_CONNECTIONS).await?;

    Ok(pool)
}

fn kind(config: &StoreConfig) -> &'static str {
    match config {
        StoreConfig::Memory { .. } => "memory",
        StoreConfig::Postgres { .. } => "postgres",
    }
}
