//! In-memory collaborators for unit and router tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::blob_store::{format_uri, parse_uri, BlobError, BlobStore};
use crate::history::{HistoryError, HistoryStore};
use crate::inference::{
    Classification, ClassifyRequest, GenerationParams, InferenceClient, InferenceError,
    SafetySetting,
};
use crate::models::analysis::{AnalysisRecord, AnalysisStatus, NewAnalysisRecord};
use crate::workflow::{Orchestrator, WorkflowSettings};

pub const BUCKET: &str = "bikes";
pub const MODEL: &str = "gemini-test";

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Bytes>>,
    fail_puts: AtomicBool,
    stall_reads: AtomicBool,
}

impl MemoryBlobStore {
    pub fn fail_puts(&self) {
        self.fail_puts.store(true, Ordering::SeqCst);
    }

    /// Reads hang until the caller's timeout expires.
    pub fn stall_reads(&self) {
        self.stall_reads.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn object(&self, uri: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(uri).cloned()
    }

    pub fn remove(&self, uri: &str) {
        self.objects.lock().unwrap().remove(uri);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, name: &str, data: Bytes, _content_type: &str) -> Result<String, BlobError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BlobError::Backend("bucket unreachable".to_string()));
        }
        let uri = format_uri(BUCKET, name);
        self.objects.lock().unwrap().insert(uri.clone(), data);
        Ok(uri)
    }

    async fn get(&self, uri: &str, timeout: Duration) -> Result<Bytes, BlobError> {
        parse_uri(uri)?;
        if self.stall_reads.load(Ordering::SeqCst) {
            return match tokio::time::timeout(timeout, std::future::pending::<()>()).await {
                Ok(()) => unreachable!(),
                Err(_) => Err(BlobError::Timeout(timeout)),
            };
        }
        self.object(uri)
            .ok_or_else(|| BlobError::NotFound(uri.to_string()))
    }
}

/// Append-only history with a deterministic, strictly increasing clock.
#[derive(Default)]
pub struct MemoryHistoryStore {
    records: Mutex<Vec<AnalysisRecord>>,
    fail_inserts: AtomicBool,
    fail_queries: AtomicBool,
}

impl MemoryHistoryStore {
    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    pub fn fail_queries(&self) {
        self.fail_queries.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Records in insertion order.
    pub fn records(&self) -> Vec<AnalysisRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Appends a record that did not go through the orchestrator.
    pub fn push_raw(&self, image_ref: &str) {
        let mut records = self.records.lock().unwrap();
        let timestamp = clock(records.len());
        records.push(AnalysisRecord {
            id: Uuid::new_v4(),
            timestamp,
            image_ref: image_ref.to_string(),
            original_filename: "legacy.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            model_used: MODEL.to_string(),
            result_text: "Yamaha SR400".to_string(),
            identified_label: "Yamaha SR400".to_string(),
            status: AnalysisStatus::Success,
        });
    }
}

fn clock(tick: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap() + chrono::Duration::seconds(tick as i64)
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn insert(&self, record: NewAnalysisRecord) -> Result<AnalysisRecord, HistoryError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(HistoryError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut records = self.records.lock().unwrap();
        let stored = AnalysisRecord {
            id: Uuid::new_v4(),
            timestamp: clock(records.len()),
            image_ref: record.image_ref,
            original_filename: record.original_filename,
            content_type: record.content_type,
            model_used: record.model_used,
            result_text: record.result_text,
            identified_label: record.identified_label,
            status: record.status,
        };
        records.push(stored.clone());
        Ok(stored)
    }

    async fn query_recent(&self, limit: u32) -> Result<Vec<AnalysisRecord>, HistoryError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(HistoryError::Database(sqlx::Error::PoolClosed));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// Owned copy of what the orchestrator sent to the model.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub uri: String,
    pub mime_type: String,
    pub prompt: String,
    pub generation: GenerationParams,
    pub safety: Vec<SafetySetting>,
}

#[derive(Clone)]
enum Script {
    Respond(Classification),
    Delay(Duration, Classification),
    Fail(String),
    Panic,
}

#[derive(Clone)]
pub struct FakeInference {
    script: Script,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl FakeInference {
    pub fn answering(text: &str) -> Self {
        Self::returning(Classification {
            text: Some(text.to_string()),
            finish_reason: Some("STOP".to_string()),
            ..Classification::default()
        })
    }

    pub fn returning(classification: Classification) -> Self {
        Self {
            script: Script::Respond(classification),
            seen: Arc::default(),
        }
    }

    /// Answers `text` after `delay` has passed on the tokio clock.
    pub fn answering_after(text: &str, delay: Duration) -> Self {
        Self {
            script: Script::Delay(
                delay,
                Classification {
                    text: Some(text.to_string()),
                    finish_reason: Some("STOP".to_string()),
                    ..Classification::default()
                },
            ),
            seen: Arc::default(),
        }
    }

    pub fn panicking() -> Self {
        Self {
            script: Script::Panic,
            seen: Arc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            script: Script::Fail(message.to_string()),
            seen: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceClient for FakeInference {
    fn model(&self) -> &str {
        MODEL
    }

    async fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Classification, InferenceError> {
        self.seen.lock().unwrap().push(SeenRequest {
            uri: request.image.uri.clone(),
            mime_type: request.image.mime_type.clone(),
            prompt: request.prompt.to_string(),
            generation: request.generation,
            safety: request.safety.to_vec(),
        });
        match &self.script {
            Script::Respond(c) => Ok(c.clone()),
            Script::Delay(delay, c) => {
                tokio::time::sleep(*delay).await;
                Ok(c.clone())
            }
            Script::Panic => panic!("model client crashed"),
            Script::Fail(message) => Err(InferenceError::Api {
                status: 503,
                message: message.clone(),
            }),
        }
    }
}

pub fn settings() -> WorkflowSettings {
    WorkflowSettings {
        unknown_markers: vec![
            "不明".to_string(),
            "ではない".to_string(),
            "unknown".to_string(),
            "not a motorcycle".to_string(),
        ],
        image_fetch_timeout: Duration::from_millis(20),
    }
}

pub fn orchestrator(
    inference: FakeInference,
) -> (Orchestrator, Arc<MemoryBlobStore>, Arc<MemoryHistoryStore>) {
    let blobs = Arc::new(MemoryBlobStore::default());
    let history = Arc::new(MemoryHistoryStore::default());
    let orchestrator = Orchestrator::new(
        blobs.clone(),
        Arc::new(inference),
        history.clone(),
        settings(),
    );
    (orchestrator, blobs, history)
}
