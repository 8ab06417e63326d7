//! Loading files that are not uploaded inline: remote URLs and local paths.

use std::path::Path;
use std::time::Duration;

use nepi_core::{Config, IntakeError, LoadedFile, OCTET_STREAM};
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;

use crate::classify::guess_media_type;

/// Name and media type supplied alongside a URL, overriding what the remote
/// server reports.
#[derive(Debug, Clone, Default)]
pub struct SourceHints {
    pub name: Option<String>,
    pub content_type: Option<String>,
}

/// Downloads remote sources with a timeout and a byte cap.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: reqwest::Client,
    base_url: Option<Url>,
    timeout: Duration,
    max_bytes: usize,
}

impl RemoteFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration, max_bytes: usize) -> Self {
        Self {
            client,
            base_url: None,
            timeout,
            max_bytes,
        }
    }

    /// Resolve relative URLs (e.g. `/uploads/bill.pdf`) against `base`.
    pub fn with_base_url(mut self, base: Url) -> Self {
        self.base_url = Some(base);
        self
    }

    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        let fetcher = Self::new(
            client,
            Duration::from_secs(config.fetch_timeout_secs),
            config.max_source_bytes,
        );
        match Url::parse(&config.public_base_url) {
            Ok(base) => fetcher.with_base_url(base),
            Err(e) => {
                tracing::warn!(
                    base = %config.public_base_url,
                    error = %e,
                    "ignoring unparseable public base URL"
                );
                fetcher
            }
        }
    }

    /// Parse `raw` into an absolute http(s) URL.
    pub fn resolve_url(&self, raw: &str) -> Result<Url, IntakeError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(IntakeError::MissingSource);
        }
        let url = match (Url::parse(raw), &self.base_url) {
            (Ok(url), _) => url,
            (Err(_), Some(base)) => base
                .join(raw)
                .map_err(|e| IntakeError::InvalidSource(format!("{raw}: {e}")))?,
            (Err(e), None) => return Err(IntakeError::InvalidSource(format!("{raw}: {e}"))),
        };
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(IntakeError::InvalidSource(format!(
                "unsupported URL scheme '{other}'"
            ))),
        }
    }

    /// Fetch `raw_url`. A non-success status fails with the status code; the
    /// body is read incrementally so oversized downloads stop at the cap.
    pub async fn fetch(&self, raw_url: &str, hints: SourceHints) -> Result<LoadedFile, IntakeError> {
        let url = self.resolve_url(raw_url)?;
        tracing::info!(url = %url, "fetching remote source");

        let mut resp = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "remote source fetch failed");
            return Err(IntakeError::SourceFetch {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(len) = resp.content_length()
            && len > self.max_bytes as u64
        {
            return Err(IntakeError::PayloadTooLarge {
                size: len as usize,
                max: self.max_bytes,
            });
        }

        let header_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let mut bytes = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(|e| self.classify(e))? {
            bytes.extend_from_slice(&chunk);
            if bytes.len() > self.max_bytes {
                return Err(IntakeError::PayloadTooLarge {
                    size: bytes.len(),
                    max: self.max_bytes,
                });
            }
        }

        let content_type = non_blank(hints.content_type)
            .or(header_type)
            .unwrap_or_else(|| OCTET_STREAM.to_string());
        let filename = non_blank(hints.name).unwrap_or_else(|| filename_from_url(&url));
        tracing::debug!(
            filename = %filename,
            content_type = %content_type,
            size = bytes.len(),
            "remote source loaded"
        );
        LoadedFile::new(bytes, content_type, filename)
    }

    fn classify(&self, e: reqwest::Error) -> IntakeError {
        if e.is_timeout() {
            IntakeError::Timeout {
                stage: "remote fetch",
                secs: self.timeout.as_secs(),
            }
        } else {
            IntakeError::Network(e.to_string())
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Percent-decoded last path segment, or `"remote-file"` when there is none.
pub fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .unwrap_or_else(|| "remote-file".to_string())
}

/// Read a local file, guessing its media type from the extension unless one
/// is given.
pub fn load_path(path: &Path, content_type: Option<String>) -> Result<LoadedFile, IntakeError> {
    let bytes = std::fs::read(path)
        .map_err(|e| IntakeError::InvalidSource(format!("cannot read {}: {e}", path.display())))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content_type =
        non_blank(content_type).unwrap_or_else(|| guess_media_type(&filename).to_string());
    LoadedFile::new(bytes, content_type, filename)
}
