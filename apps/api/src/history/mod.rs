//! History Store: append-only log of analysis records.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::analysis::{AnalysisRecord, NewAnalysisRecord};

pub mod postgres;

pub use postgres::PgHistoryStore;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt history row {id}: {reason}")]
    CorruptRow { id: uuid::Uuid, reason: String },
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends one record. The store assigns `id` and `timestamp`.
    async fn insert(&self, record: NewAnalysisRecord) -> Result<AnalysisRecord, HistoryError>;

    /// Most recent `limit` records, newest first.
    async fn query_recent(&self, limit: u32) -> Result<Vec<AnalysisRecord>, HistoryError>;
}
