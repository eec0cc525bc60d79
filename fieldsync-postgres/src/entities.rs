use sqlx::{PgPool, prelude::FromRow};

/// A row from the fieldsync.entities table.
#[derive(Debug, Clone, FromRow)]
pub struct EntityRow {
    pub natural_key: String,
    pub document: serde_json::Value,
}

/// A row from the fieldsync.entity_history table.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryRow {
    pub natural_key: String,
    pub entry_id: String,
    pub sequence: i64,
    pub document: serde_json::Value,
}

/// One write inside an atomic batch.
#[derive(Debug, Clone)]
pub enum WriteRow {
    /// Deep merges `document` into the entity stored under `natural_key`.
    UpsertEntity {
        natural_key: String,
        document: serde_json::Value,
    },
    /// Deep merges `document` into the history entry stored under `(natural_key, entry_id)`.
    UpsertHistory {
        natural_key: String,
        entry_id: String,
        sequence: i64,
        document: serde_json::Value,
    },
}

pub async fn get_entity(pool: &PgPool, natural_key: &str) -> sqlx::Result<Option<EntityRow>> {
    sqlx::query_as::<_, EntityRow>(
        r#"
        select natural_key, document
        from fieldsync.entities
        where natural_key = $1
        "#,
    )
    .bind(natural_key)
    .fetch_optional(pool)
    .await
}

/// Returns the keys of entities whose `lastSyncedFrom` equals `source_tag`, sorted.
pub async fn get_keys_by_source(pool: &PgPool, source_tag: &str) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar(
        r#"
        select natural_key
        from fieldsync.entities
        where document ->> 'lastSyncedFrom' = $1
        order by natural_key
        "#,
    )
    .bind(source_tag)
    .fetch_all(pool)
    .await
}

pub async fn count_entities(pool: &PgPool) -> sqlx::Result<i64> {
    sqlx::query_scalar("select count(*) from fieldsync.entities")
        .fetch_one(pool)
        .await
}

pub async fn count_history_entries(pool: &PgPool) -> sqlx::Result<i64> {
    sqlx::query_scalar("select count(*) from fieldsync.entity_history")
        .fetch_one(pool)
        .await
}

/// Returns the history of one entity in reconstruction order.
pub async fn get_history(pool: &PgPool, natural_key: &str) -> sqlx::Result<Vec<HistoryRow>> {
    sqlx::query_as::<_, HistoryRow>(
        r#"
        select natural_key, entry_id, sequence, document
        from fieldsync.entity_history
        where natural_key = $1
        order by sequence, entry_id
        "#,
    )
    .bind(natural_key)
    .fetch_all(pool)
    .await
}

pub async fn get_history_entry(
    pool: &PgPool,
    natural_key: &str,
    entry_id: &str,
) -> sqlx::Result<Option<HistoryRow>> {
    sqlx::query_as::<_, HistoryRow>(
        r#"
        select natural_key, entry_id, sequence, document
        from fieldsync.entity_history
        where natural_key = $1 and entry_id = $2
        "#,
    )
    .bind(natural_key)
    .bind(entry_id)
    .fetch_optional(pool)
    .await
}

/// Applies every write in a single transaction. Either all writes land or none do.
pub async fn apply_write_batch(pool: &PgPool, writes: &[WriteRow]) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    for write in writes {
        match write {
            WriteRow::UpsertEntity {
                natural_key,
                document,
            } => {
                sqlx::query(
                    r#"
                    insert into fieldsync.entities (natural_key, document)
                    values ($1, $2)
                    on conflict (natural_key) do update
                    set document = fieldsync.jsonb_deep_merge(fieldsync.entities.document, excluded.document),
                        updated_at = now()
                    "#,
                )
                .bind(natural_key)
                .bind(document)
                .execute(&mut *tx)
                .await?;
            }
            WriteRow::UpsertHistory {
                natural_key,
                entry_id,
                sequence,
                document,
            } => {
                sqlx::query(
                    r#"
                    insert into fieldsync.entity_history (natural_key, entry_id, sequence, document)
                    values ($1, $2, $3, $4)
                    on conflict (natural_key, entry_id) do update
                    set document = fieldsync.jsonb_deep_merge(fieldsync.entity_history.document, excluded.document),
                        sequence = excluded.sequence,
                        updated_at = now()
                    "#,
                )
                .bind(natural_key)
                .bind(entry_id)
                .bind(sequence)
                .bind(document)
                .execute(&mut *tx)
                .await?;
            }
        }
    }

    tx.commit().await?;

    Ok(())
}
