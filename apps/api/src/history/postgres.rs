use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use super::{HistoryError, HistoryStore};
use crate::models::analysis::{AnalysisRecord, AnalysisRow, NewAnalysisRecord};

/// History store backed by one Postgres table.
/// CRITICAL: append-only. Rows are never UPDATEd or DELETEd from here.
#[derive(Clone)]
pub struct PgHistoryStore {
    pool: PgPool,
    table: String,
}

impl PgHistoryStore {
    /// `table` must already be validated as a plain identifier (see `Config::from_env`).
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Creates the history table if it does not exist yet.
    ///
    /// `id` and `created_at` are filled in by the server; `seq` breaks ties between
    /// rows written within the same clock tick so ordering follows insertion.
    pub async fn ensure_schema(&self) -> Result<(), HistoryError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id                UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                seq               BIGSERIAL NOT NULL,
                created_at        TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp(),
                image_ref         TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                content_type      TEXT NOT NULL,
                model_used        TEXT NOT NULL,
                result_text       TEXT NOT NULL,
                identified_label  TEXT NOT NULL,
                status            TEXT NOT NULL
            )
            "#,
            table = self.table
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_recent_idx ON {table} (created_at DESC, seq DESC)",
            table = self.table
        ))
        .execute(&self.pool)
        .await?;

        info!("History table '{}' ready", self.table);
        Ok(())
    }
}

fn into_record(row: AnalysisRow) -> Result<AnalysisRecord, HistoryError> {
    let id = row.id;
    AnalysisRecord::try_from(row).map_err(|reason| HistoryError::CorruptRow { id, reason })
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn insert(&self, record: NewAnalysisRecord) -> Result<AnalysisRecord, HistoryError> {
        let row = sqlx::query_as::<_, AnalysisRow>(&format!(
            r#"
            INSERT INTO {table}
                (image_ref, original_filename, content_type, model_used,
                 result_text, identified_label, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
            table = self.table
        ))
        .bind(&record.image_ref)
        .bind(&record.original_filename)
        .bind(&record.content_type)
        .bind(&record.model_used)
        .bind(&record.result_text)
        .bind(&record.identified_label)
        .bind(record.status.as_str())
        .fetch_one(&self.pool)
        .await?;

        into_record(row)
    }

    async fn query_recent(&self, limit: u32) -> Result<Vec<AnalysisRecord>, HistoryError> {
        let rows = sqlx::query_as::<_, AnalysisRow>(&format!(
            "SELECT * FROM {table} ORDER BY created_at DESC, seq DESC LIMIT $1",
            table = self.table
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_record).collect()
    }
}
