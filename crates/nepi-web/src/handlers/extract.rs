use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use nepi_core::ExtractionResponse;

use crate::error::ApiError;
use crate::resolve::resolve_source;
use crate::state::AppState;

/// `POST|GET /api/extract`
pub async fn extract(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<ExtractionResponse>, ApiError> {
    let file = resolve_source(&state, req).await?;
    let response = state.pipeline.process(file).await?;
    Ok(Json(response))
}
