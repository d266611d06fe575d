use std::time::Duration;

use anyhow::{bail, Context, Result};

const DEFAULT_HISTORY_TABLE: &str = "bike_analyze_history";
const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";
const DEFAULT_UNKNOWN_MARKERS: &str = "不明,ではない,unknown,not a motorcycle";
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// How the inference service is reached.
#[derive(Debug, Clone)]
pub enum InferenceEndpoint {
    /// Generative Language API, authenticated with an API key.
    Studio { api_key: String },
    /// Vertex AI, scoped to a project and region, authenticated with a bearer token.
    Vertex {
        project: String,
        location: String,
        access_token: String,
    },
}

/// Application configuration loaded from environment variables.
/// Read once at startup; startup aborts if anything required is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub history_table: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub inference_endpoint: InferenceEndpoint,
    pub model: String,
    pub unknown_markers: Vec<String>,
    pub history_limit: u32,
    pub image_fetch_timeout: Duration,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let history_table = optional_env("HISTORY_TABLE", DEFAULT_HISTORY_TABLE);
        if !is_plain_identifier(&history_table) {
            bail!("HISTORY_TABLE '{history_table}' must match [a-z_][a-z0-9_]*");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            history_table,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            s3_region: optional_env("S3_REGION", "us-east-1"),
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            inference_endpoint: inference_endpoint_from_env()?,
            model: optional_env("GEMINI_MODEL", DEFAULT_MODEL),
            unknown_markers: parse_markers(&optional_env(
                "UNKNOWN_MARKERS",
                DEFAULT_UNKNOWN_MARKERS,
            )),
            history_limit: parse_env("HISTORY_LIMIT", 10u32)?.clamp(1, MAX_HISTORY_LIMIT),
            image_fetch_timeout: Duration::from_secs(parse_env("IMAGE_FETCH_TIMEOUT_SECS", 60u64)?),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024usize)?,
            port: parse_env("PORT", 8080u16)?,
            rust_log: optional_env("RUST_LOG", "info"),
        })
    }
}

fn inference_endpoint_from_env() -> Result<InferenceEndpoint> {
    if let Ok(api_key) = std::env::var("GEMINI_API_KEY") {
        return Ok(InferenceEndpoint::Studio { api_key });
    }
    match (
        std::env::var("GOOGLE_CLOUD_PROJECT"),
        std::env::var("GOOGLE_ACCESS_TOKEN"),
    ) {
        (Ok(project), Ok(access_token)) => Ok(InferenceEndpoint::Vertex {
            project,
            location: optional_env("VERTEX_AI_LOCATION", "us-central1"),
            access_token,
        }),
        _ => bail!(
            "No inference credentials: set GEMINI_API_KEY, or GOOGLE_CLOUD_PROJECT and GOOGLE_ACCESS_TOKEN"
        ),
    }
}

/// Splits a comma-separated marker list, dropping blanks.
pub fn parse_markers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// The history table name is spliced into SQL, so only plain identifiers are accepted.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
