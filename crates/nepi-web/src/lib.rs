use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;
pub mod models;
pub mod resolve;
pub mod state;
pub mod upload;

pub use error::{ApiError, status_for};
pub use state::AppState;
pub use upload::{BlobStore, LocalBlobStore};

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.body_limit_bytes);
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .route(
            "/api/extract",
            post(handlers::extract::extract).get(handlers::extract::extract),
        )
        .route("/api/upload", post(handlers::upload::upload))
        .nest_service("/uploads", uploads)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
