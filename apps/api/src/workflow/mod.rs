//! Workflow Orchestrator: submit and history view.
//!
//! Submission flow:
//!   store image → classify with the fixed prompt → append one history record.
//!
//! A failed image write aborts with nothing recorded. Once the image is stored,
//! every outcome (including inference failures) ends in exactly one history insert
//! attempt; an insert failure is reported in the outcome and never rolls back the blob.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use bytes::Bytes;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::blob_store::{object_name_for, BlobError, BlobStore};
use crate::history::{HistoryError, HistoryStore};
use crate::inference::prompts::{classify_safety, CLASSIFY_GENERATION, CLASSIFY_PROMPT};
use crate::inference::{ClassifyRequest, ImagePart, InferenceClient};
use crate::models::analysis::{AnalysisRecord, AnalysisStatus, NewAnalysisRecord};

pub mod outcome;

use outcome::{classify_outcome, Analysis};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Storage error: {0}")]
    Storage(#[source] BlobError),

    #[error("History query error: {0}")]
    HistoryQuery(#[source] HistoryError),

    #[error("Recording task failed: {0}")]
    Recording(String),
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub unknown_markers: Vec<String>,
    pub image_fetch_timeout: Duration,
}

/// One uploaded image as received from the uploader.
#[derive(Debug, Clone)]
pub struct Upload {
    pub data: Bytes,
    pub filename: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HistoryWrite {
    Recorded { record: AnalysisRecord },
    Failed { error: String },
}

/// Everything a UI needs to show for one submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub image_ref: String,
    pub original_filename: String,
    pub content_type: String,
    pub model_used: String,
    pub status: AnalysisStatus,
    pub result_text: String,
    pub identified_label: String,
    pub history: HistoryWrite,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ImageResolution {
    Available {
        content_type: String,
        #[serde(serialize_with = "serialize_base64")]
        data: Bytes,
    },
    /// The object was deleted out-of-band.
    Missing,
    InvalidRef,
    TimedOut,
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub record: AnalysisRecord,
    pub image: ImageResolution,
}

fn serialize_base64<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
}

/// The intent to record a submission, held from the moment its image is stored.
/// Owned by the recording task, which always ends in `finish`.
struct PendingRecord {
    history: Arc<dyn HistoryStore>,
    image_ref: String,
    original_filename: String,
    content_type: String,
    model_used: String,
}

impl PendingRecord {
    async fn finish(self, analysis: Analysis) -> SubmitOutcome {
        let new_record = NewAnalysisRecord {
            image_ref: self.image_ref.clone(),
            original_filename: self.original_filename.clone(),
            content_type: self.content_type.clone(),
            model_used: self.model_used.clone(),
            result_text: analysis.result_text.clone(),
            identified_label: analysis.identified_label.clone(),
            status: analysis.status,
        };

        let history = match self.history.insert(new_record).await {
            Ok(record) => {
                info!("Recorded analysis {} ({})", record.id, record.status);
                HistoryWrite::Recorded { record }
            }
            Err(e) => {
                error!("History write failed for {}: {e}", self.image_ref);
                HistoryWrite::Failed {
                    error: e.to_string(),
                }
            }
        };

        SubmitOutcome {
            image_ref: self.image_ref,
            original_filename: self.original_filename,
            content_type: self.content_type,
            model_used: self.model_used,
            status: analysis.status,
            result_text: analysis.result_text,
            identified_label: analysis.identified_label,
            history,
        }
    }
}

pub struct Orchestrator {
    blobs: Arc<dyn BlobStore>,
    inference: Arc<dyn InferenceClient>,
    history: Arc<dyn HistoryStore>,
    settings: WorkflowSettings,
}

impl Orchestrator {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        inference: Arc<dyn InferenceClient>,
        history: Arc<dyn HistoryStore>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            blobs,
            inference,
            history,
            settings,
        }
    }

    /// Stores, classifies and records one uploaded image.
    ///
    /// Only a failed image write is a `Storage` error; everything after it is
    /// captured in the returned outcome. Classification and recording run on their
    /// own task, so dropping this future after the write still leaves a record.
    pub async fn submit(&self, upload: Upload) -> Result<SubmitOutcome, WorkflowError> {
        let Upload {
            data,
            filename,
            content_type,
        } = upload;

        let object_name = object_name_for(&filename);
        let image_ref = self
            .blobs
            .put(&object_name, data.clone(), &content_type)
            .await
            .map_err(|e| {
                error!("Image upload for '{filename}' failed: {e}");
                WorkflowError::Storage(e)
            })?;
        info!("Stored '{filename}' at {image_ref}");

        let pending = PendingRecord {
            history: Arc::clone(&self.history),
            image_ref: image_ref.clone(),
            original_filename: filename,
            content_type: content_type.clone(),
            model_used: self.inference.model().to_string(),
        };
        let image = ImagePart {
            uri: image_ref,
            mime_type: content_type,
            data,
        };
        let inference = Arc::clone(&self.inference);
        let markers = self.settings.unknown_markers.clone();

        let recording = tokio::spawn(async move {
            let uri = image.uri.clone();
            // A panic inside the model call must not cost the record.
            let analysis = match tokio::spawn(analyze(inference, image, markers)).await {
                Ok(analysis) => analysis,
                Err(e) => {
                    error!("Analysis task for {uri} failed: {e}");
                    Analysis::processing_error(format!("analysis task failed: {e}"))
                }
            };
            pending.finish(analysis).await
        });

        recording.await.map_err(|e| {
            error!("Recording task failed: {e}");
            WorkflowError::Recording(e.to_string())
        })
    }

    /// The `limit` most recent records, newest first, each with its image resolved.
    /// Per-image failures are attached to their entry; only a failed query is an `Err`.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<HistoryEntry>, WorkflowError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let records = self.history.query_recent(limit).await.map_err(|e| {
            error!("History query failed: {e}");
            WorkflowError::HistoryQuery(e)
        })?;

        let mut entries = Vec::with_capacity(records.len());
        for record in records.into_iter().take(limit as usize) {
            let image = self.resolve_image(&record).await;
            entries.push(HistoryEntry { record, image });
        }
        Ok(entries)
    }

    async fn resolve_image(&self, record: &AnalysisRecord) -> ImageResolution {
        let timeout = self.settings.image_fetch_timeout;
        match self.blobs.get(&record.image_ref, timeout).await {
            Ok(data) => ImageResolution::Available {
                content_type: record.content_type.clone(),
                data,
            },
            Err(e) => {
                warn!("Image for record {} unavailable: {e}", record.id);
                match e {
                    BlobError::NotFound(_) => ImageResolution::Missing,
                    BlobError::InvalidRef(_) => ImageResolution::InvalidRef,
                    BlobError::Timeout(_) => ImageResolution::TimedOut,
                    BlobError::Backend(reason) => ImageResolution::Unavailable { reason },
                }
            }
        }
    }
}

async fn analyze(
    inference: Arc<dyn InferenceClient>,
    image: ImagePart,
    unknown_markers: Vec<String>,
) -> Analysis {
    let safety = classify_safety();
    let request = ClassifyRequest {
        image: &image,
        prompt: CLASSIFY_PROMPT,
        generation: CLASSIFY_GENERATION,
        safety: &safety,
    };

    let analysis = classify_outcome(inference.classify(&request).await, &unknown_markers);
    match analysis.status {
        AnalysisStatus::Success => info!("Identified {}: {}", image.uri, analysis.result_text),
        AnalysisStatus::IdentificationFailed => {
            warn!("Inconclusive answer for {}: {}", image.uri, analysis.result_text)
        }
        AnalysisStatus::InferenceError | AnalysisStatus::ProcessingError => warn!(
            "Analysis of {} ended with {}: {}",
            image.uri, analysis.status, analysis.result_text
        ),
    }
    analysis
}
