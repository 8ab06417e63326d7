use std::sync::Arc;

use nepi_core::Config;
use nepi_web::{AppState, router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;
    tracing::debug!(?config, "configuration loaded");

    let state = Arc::new(AppState::from_config(config)?);
    tracing::info!(
        strategy = state.pipeline.strategy_name(),
        upload_dir = %state.config.upload_dir.display(),
        "extraction pipeline ready"
    );

    let listener = tokio::net::TcpListener::bind(&state.config.bind).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutting down");
}
