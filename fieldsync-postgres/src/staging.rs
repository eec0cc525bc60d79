use sqlx::{PgPool, prelude::FromRow};

/// A row from the fieldsync.staging_records table.
#[derive(Debug, Clone, FromRow)]
pub struct StagingRecordRow {
    pub id: String,
    pub attributes: serde_json::Value,
}

/// Fetches up to `limit` staging records whose trimmed `field` attribute is one of `values`,
/// strictly after the `after` record id in primary key order.
pub async fn fetch_staging_page(
    pool: &PgPool,
    field: &str,
    values: &[String],
    after: Option<&str>,
    limit: i64,
) -> sqlx::Result<Vec<StagingRecordRow>> {
    let rows = sqlx::query_as::<_, StagingRecordRow>(
        r#"
        select id, attributes
        from fieldsync.staging_records
        where btrim(attributes ->> $1, e' \t\r\n') = any($2)
          and ($3::text is null or id > $3)
        order by id
        limit $4
        "#,
    )
    .bind(field)
    .bind(values)
    .bind(after)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches every staging record where any of `key_fields` holds `key`, unfiltered by status.
///
/// Callers re-resolve the natural key per record since a record may carry the
/// value in a lower priority field.
pub async fn fetch_staging_records_for_key(
    pool: &PgPool,
    key_fields: &[String],
    key: &str,
) -> sqlx::Result<Vec<StagingRecordRow>> {
    let rows = sqlx::query_as::<_, StagingRecordRow>(
        r#"
        select id, attributes
        from fieldsync.staging_records r
        where exists (
            select 1 from unnest($1::text[]) as f(name)
            where btrim(r.attributes ->> f.name, e' \t\r\n') = $2
        )
        order by id
        "#,
    )
    .bind(key_fields)
    .bind(key)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Inserts staging records, ignoring ids that already exist.
pub async fn insert_staging_records(
    pool: &PgPool,
    records: &[StagingRecordRow],
) -> sqlx::Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for record in records {
        let result = sqlx::query(
            r#"
            insert into fieldsync.staging_records (id, attributes)
            values ($1, $2)
            on conflict (id) do nothing
            "#,
        )
        .bind(&record.id)
        .bind(&record.attributes)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;

    Ok(inserted)
}
