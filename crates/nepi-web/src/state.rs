use std::sync::Arc;

use nepi_core::{Config, ConfigError};
use nepi_ingest::{Pipeline, RemoteFetcher};

use crate::upload::{BlobStore, LocalBlobStore};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub config: Config,
    pub pipeline: Pipeline,
    pub fetcher: RemoteFetcher,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("nepi-intake/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        let pipeline = Pipeline::from_config(&config, client.clone())?;
        let fetcher = RemoteFetcher::from_config(&config, client);
        let blobs = Arc::new(LocalBlobStore::new(config.upload_dir.clone()));
        Ok(Self {
            config,
            pipeline,
            fetcher,
            blobs,
        })
    }
}
