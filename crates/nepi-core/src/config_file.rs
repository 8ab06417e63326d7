use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub server: Option<ServerConfig>,
    pub extraction: Option<ExtractionConfig>,
    pub delegated: Option<DelegatedFileConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub body_limit_mb: Option<usize>,
    pub upload_dir: Option<String>,
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub max_text_chars: Option<usize>,
    pub preview_chars: Option<usize>,
    pub pdf_fallback_threshold: Option<usize>,
    pub max_source_mb: Option<usize>,
    pub fetch_timeout_secs: Option<u64>,
    pub strategy: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelegatedFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_prompt_chars: Option<usize>,
}

/// Platform config directory path: `<config_dir>/nepi/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nepi").join("config.toml"))
}

/// Load config by cascading CWD `.nepi.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".nepi.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

fn pick<T: Clone, S>(overlay: &Option<S>, base: &Option<S>, get: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&get)
        .or_else(|| base.as_ref().and_then(&get))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        server: Some(ServerConfig {
            bind: pick(&overlay.server, &base.server, |s| s.bind.clone()),
            body_limit_mb: pick(&overlay.server, &base.server, |s| s.body_limit_mb),
            upload_dir: pick(&overlay.server, &base.server, |s| s.upload_dir.clone()),
            public_base_url: pick(&overlay.server, &base.server, |s| {
                s.public_base_url.clone()
            }),
        }),
        extraction: Some(ExtractionConfig {
            max_text_chars: pick(&overlay.extraction, &base.extraction, |e| e.max_text_chars),
            preview_chars: pick(&overlay.extraction, &base.extraction, |e| e.preview_chars),
            pdf_fallback_threshold: pick(&overlay.extraction, &base.extraction, |e| {
                e.pdf_fallback_threshold
            }),
            max_source_mb: pick(&overlay.extraction, &base.extraction, |e| e.max_source_mb),
            fetch_timeout_secs: pick(&overlay.extraction, &base.extraction, |e| {
                e.fetch_timeout_secs
            }),
            strategy: pick(&overlay.extraction, &base.extraction, |e| e.strategy.clone()),
        }),
        delegated: Some(DelegatedFileConfig {
            api_key: pick(&overlay.delegated, &base.delegated, |d| d.api_key.clone()),
            base_url: pick(&overlay.delegated, &base.delegated, |d| d.base_url.clone()),
            model: pick(&overlay.delegated, &base.delegated, |d| d.model.clone()),
            timeout_secs: pick(&overlay.delegated, &base.delegated, |d| d.timeout_secs),
            max_prompt_chars: pick(&overlay.delegated, &base.delegated, |d| {
                d.max_prompt_chars
            }),
        }),
    }
}
