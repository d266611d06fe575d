use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Terminal status of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Success,
    /// The model answered, but inconclusively. Not a system error.
    IdentificationFailed,
    /// The model returned no usable content (blocked or empty).
    InferenceError,
    /// Something unexpected broke while calling or reading the model.
    ProcessingError,
}

impl AnalysisStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisStatus::Success => "success",
            AnalysisStatus::IdentificationFailed => "identification_failed",
            AnalysisStatus::InferenceError => "inference_error",
            AnalysisStatus::ProcessingError => "processing_error",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(AnalysisStatus::Success),
            "identification_failed" => Ok(AnalysisStatus::IdentificationFailed),
            "inference_error" => Ok(AnalysisStatus::InferenceError),
            "processing_error" => Ok(AnalysisStatus::ProcessingError),
            other => Err(format!("unknown analysis status '{other}'")),
        }
    }
}

/// Fields gathered by the orchestrator before the history insert.
/// `id` and `timestamp` are assigned by the history store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalysisRecord {
    pub image_ref: String,
    pub original_filename: String,
    pub content_type: String,
    pub model_used: String,
    pub result_text: String,
    pub identified_label: String,
    pub status: AnalysisStatus,
}

/// One persisted submission outcome. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub image_ref: String,
    pub original_filename: String,
    pub content_type: String,
    pub model_used: String,
    pub result_text: String,
    pub identified_label: String,
    pub status: AnalysisStatus,
}

#[derive(Debug, Clone, FromRow)]
pub struct AnalysisRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub image_ref: String,
    pub original_filename: String,
    pub content_type: String,
    pub model_used: String,
    pub result_text: String,
    pub identified_label: String,
    pub status: String,
}

impl TryFrom<AnalysisRow> for AnalysisRecord {
    type Error = String;

    fn try_from(row: AnalysisRow) -> Result<Self, Self::Error> {
        Ok(AnalysisRecord {
            status: row.status.parse()?,
            id: row.id,
            timestamp: row.created_at,
            image_ref: row.image_ref,
            original_filename: row.original_filename,
            content_type: row.content_type,
            model_used: row.model_used,
            result_text: row.result_text,
            identified_label: row.identified_label,
        })
    }
}
