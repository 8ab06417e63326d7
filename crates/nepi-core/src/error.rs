use thiserror::Error;

/// Failures that terminate an intake request.
///
/// Absorbed failures (a primary PDF backend error, a malformed delegated
/// response) never appear here; they only reduce what the response contains.
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("No file provided. Upload a file or pass a ?url= to this endpoint.")]
    MissingSource,
    #[error("invalid source: {0}")]
    InvalidSource(String),
    #[error("the provided file is empty")]
    EmptySource,
    #[error("file is too large ({size} bytes, limit {max} bytes)")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("Failed to fetch file (HTTP {status}) from {url}")]
    SourceFetch { status: u16, url: String },
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },
    #[error("network error: {0}")]
    Network(String),
    #[error("delegated extraction failed: {0}")]
    Delegated(String),
    #[error("{0}")]
    Unexpected(String),
}

impl IntakeError {
    /// True for failures caused by the request itself rather than by the
    /// server or an upstream dependency.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IntakeError::MissingSource
                | IntakeError::InvalidSource(_)
                | IntakeError::EmptySource
                | IntakeError::PayloadTooLarge { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown extraction strategy '{0}' (expected auto, heuristic or delegated)")]
    InvalidStrategy(String),
    #[error("delegated extraction requested but no API key is configured")]
    MissingApiKey,
    #[error("failed to read config {path}: {message}")]
    Read { path: String, message: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
