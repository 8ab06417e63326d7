//! Source resolution: turn an inbound request into a [`LoadedFile`].
//!
//! Tried in order: multipart (`file`, else `url`/`blobUrl`), JSON `{url}`,
//! then `?url=`. The first that yields a file wins.

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Query, Request};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use nepi_core::{IntakeError, LoadedFile};
use nepi_ingest::SourceHints;

use crate::error::ApiError;
use crate::models::{JsonSource, UrlQuery};
use crate::state::AppState;
use crate::upload::parse_multipart;

pub async fn resolve_source(state: &AppState, req: Request) -> Result<LoadedFile, ApiError> {
    let query_url = Query::<UrlQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.url)
        .filter(|u| !u.trim().is_empty());
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.contains("multipart/form-data") {
        let multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;
        let fields = parse_multipart(multipart).await?;
        if let Some(file) = fields.file {
            let max = state.config.max_source_bytes;
            if file.data.len() > max {
                return Err(IntakeError::PayloadTooLarge {
                    size: file.data.len(),
                    max,
                }
                .into());
            }
            tracing::debug!(filename = %file.filename, size = file.data.len(), "resolved multipart upload");
            return Ok(LoadedFile::new(file.data, file.content_type, file.filename)?);
        }
        if let Some(url) = fields.url {
            return Ok(state.fetcher.fetch(&url, SourceHints::default()).await?);
        }
    } else if content_type.contains("application/json") {
        let body = Bytes::from_request(req, &()).await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::new(e.status(), e.body_text())
            } else {
                ApiError::new(StatusCode::BAD_REQUEST, e.body_text())
            }
        })?;
        // An unparseable body is treated like an absent one.
        let source: JsonSource = serde_json::from_slice(&body).unwrap_or_default();
        if let Some(url) = source.url.filter(|u| !u.trim().is_empty()) {
            let hints = SourceHints {
                name: source.name,
                content_type: source.content_type,
            };
            return Ok(state.fetcher.fetch(&url, hints).await?);
        }
    }

    match query_url {
        Some(url) => Ok(state.fetcher.fetch(&url, SourceHints::default()).await?),
        None => Err(IntakeError::MissingSource.into()),
    }
}
