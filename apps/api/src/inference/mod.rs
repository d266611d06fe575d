//! Inference Client: the single point of entry for vision-model calls.
//!
//! The orchestrator builds one `ClassifyRequest` per submission and hands it to
//! whatever `InferenceClient` the app was started with. `GeminiClient` is the
//! production backend.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod gemini;
pub mod prompts;

pub use gemini::GeminiClient;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The stored image handed to the model.
/// `uri` is the blob reference; `data` is the same bytes that were stored under it.
#[derive(Debug, Clone)]
pub struct ImagePart {
    pub uri: String,
    pub mime_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
}

impl HarmCategory {
    pub const ALL: [HarmCategory; 4] = [
        HarmCategory::HateSpeech,
        HarmCategory::DangerousContent,
        HarmCategory::SexuallyExplicit,
        HarmCategory::Harassment,
    ];
}

/// Only the threshold the classifier runs with is modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockThreshold {
    BlockMediumAndAbove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: BlockThreshold,
}

/// Applies one threshold to every hazard category.
pub fn uniform_safety(threshold: BlockThreshold) -> Vec<SafetySetting> {
    HarmCategory::ALL
        .iter()
        .map(|&category| SafetySetting {
            category,
            threshold,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ClassifyRequest<'a> {
    pub image: &'a ImagePart,
    pub prompt: &'a str,
    pub generation: GenerationParams,
    pub safety: &'a [SafetySetting],
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SafetyRating {
    pub category: String,
    #[serde(default)]
    pub probability: Option<String>,
    #[serde(default)]
    pub blocked: bool,
}

/// What came back from the model. `text` is `None` when there was no usable content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub text: Option<String>,
    pub finish_reason: Option<String>,
    pub block_reason: Option<String>,
    pub safety_ratings: Vec<SafetyRating>,
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Identifier recorded as `model_used`.
    fn model(&self) -> &str;

    async fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Classification, InferenceError>;
}
