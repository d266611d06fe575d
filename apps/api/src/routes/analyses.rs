//! Axum route handlers for submissions and the history view.

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::MAX_HISTORY_LIMIT;
use crate::errors::AppError;
use crate::state::AppState;
use crate::workflow::{HistoryEntry, SubmitOutcome, Upload};

/// Multipart field carrying the image file.
pub const IMAGE_FIELD: &str = "image";

const ALLOWED_EXTENSIONS: [(&str, &str); 3] = [
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
];

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub entries: Vec<HistoryEntry>,
}

/// POST /api/v1/analyses
///
/// Stores the uploaded image, identifies it and records the outcome.
/// Returns 201 even when the model failed; the status field carries the result.
pub async fn handle_submit(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitOutcome>), AppError> {
    let upload = read_upload(&mut multipart).await?;
    let outcome = state.orchestrator.submit(upload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /api/v1/analyses?limit=N
pub async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = params
        .limit
        .unwrap_or(state.history_limit)
        .clamp(1, MAX_HISTORY_LIMIT);
    let entries = state.orchestrator.list_recent(limit).await?;
    Ok(Json(HistoryResponse { entries }))
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("image field has no filename".to_string()))?;
        let declared = field.content_type().map(str::to_string);
        let data = field.bytes().await?;
        return validate_upload(filename, declared, data);
    }
    Err(AppError::Validation(format!(
        "missing '{IMAGE_FIELD}' file field"
    )))
}

/// Accepts jpg/jpeg/png uploads. A declared content type is kept only when it is
/// an `image/*` type; anything else is replaced by the one the extension implies.
pub fn validate_upload(
    filename: String,
    declared_content_type: Option<String>,
    data: Bytes,
) -> Result<Upload, AppError> {
    if data.is_empty() {
        return Err(AppError::Validation(format!("'{filename}' is empty")));
    }

    let extension = std::path::Path::new(&filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let inferred = ALLOWED_EXTENSIONS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "'{filename}' is not a jpg, jpeg or png image"
            ))
        })?;

    let content_type = match declared_content_type {
        Some(ct) if ct.to_ascii_lowercase().starts_with("image/") => ct,
        _ => inferred.to_string(),
    };

    Ok(Upload {
        data,
        filename,
        content_type,
    })
}
