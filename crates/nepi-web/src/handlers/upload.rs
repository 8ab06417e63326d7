use std::sync::Arc;

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;

use crate::error::ApiError;
use crate::models::{UploadMeta, UploadResponse};
use crate::state::AppState;
use crate::upload::parse_multipart;

/// `POST /api/upload`
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::new(e.status(), e.body_text()))?;
    let file = parse_multipart(multipart)
        .await?
        .file
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "No file provided"))?;

    let file_url = state
        .blobs
        .store(&file.filename, &file.data, &file.content_type)
        .await?;

    Ok(Json(UploadResponse {
        ok: true,
        file_url,
        meta: UploadMeta {
            filename: file.filename,
            size: file.data.len(),
            content_type: file.content_type,
        },
        message: "Upload successful".to_string(),
    }))
}
