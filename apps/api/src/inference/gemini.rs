//! Gemini `generateContent` backend.
//!
//! Works against either the Generative Language API (API key) or Vertex AI
//! (project + region + bearer token). One request per call; no retries.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    Classification, ClassifyRequest, GenerationParams, InferenceClient, InferenceError,
    SafetyRating, SafetySetting,
};
use crate::config::InferenceEndpoint;

const STUDIO_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationParams,
    safety_settings: &'a [SafetySetting],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl From<GenerateContentResponse> for Classification {
    fn from(response: GenerateContentResponse) -> Self {
        let block_reason = response.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = response.candidates.into_iter().next() else {
            return Classification {
                block_reason,
                ..Classification::default()
            };
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        let text = text.trim();

        Classification {
            text: (!text.is_empty()).then(|| text.to_string()),
            finish_reason: candidate.finish_reason,
            block_reason,
            safety_ratings: candidate.safety_ratings,
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: InferenceEndpoint,
    model: String,
}

impl GeminiClient {
    pub fn new(endpoint: InferenceEndpoint, model: impl Into<String>) -> Result<Self, InferenceError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            endpoint,
            model: model.into(),
        })
    }

    fn url(&self) -> String {
        match &self.endpoint {
            InferenceEndpoint::Studio { .. } => {
                format!("{STUDIO_API_BASE}/models/{}:generateContent", self.model)
            }
            InferenceEndpoint::Vertex {
                project, location, ..
            } => format!(
                "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{}:generateContent",
                self.model
            ),
        }
    }
}

fn build_request<'a>(request: &'a ClassifyRequest<'a>) -> GenerateContentRequest<'a> {
    let image = request.image;
    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![
                RequestPart::InlineData {
                    inline_data: InlineData {
                        mime_type: &image.mime_type,
                        data: base64::engine::general_purpose::STANDARD.encode(&image.data),
                    },
                },
                RequestPart::Text {
                    text: request.prompt,
                },
            ],
        }],
        generation_config: request.generation,
        safety_settings: request.safety,
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Classification, InferenceError> {
        let body = build_request(request);
        debug!("Classifying {} with {}", request.image.uri, self.model);

        let builder = self.client.post(self.url()).json(&body);
        let builder = match &self.endpoint {
            InferenceEndpoint::Studio { api_key } => builder.header("x-goog-api-key", api_key),
            InferenceEndpoint::Vertex { access_token, .. } => builder.bearer_auth(access_token),
        };

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(InferenceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)?;
        Ok(parsed.into())
    }
}
