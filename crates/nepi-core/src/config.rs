use std::path::PathBuf;
use std::str::FromStr;

use crate::config_file::{self, ConfigFile};
use crate::error::ConfigError;

const MB: usize = 1024 * 1024;

/// Which fact extraction strategy the service runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyChoice {
    /// Delegated when an API key is configured, heuristic otherwise.
    #[default]
    Auto,
    Heuristic,
    Delegated,
}

impl FromStr for StrategyChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(StrategyChoice::Auto),
            "heuristic" | "regex" => Ok(StrategyChoice::Heuristic),
            "delegated" | "llm" => Ok(StrategyChoice::Delegated),
            other => Err(ConfigError::InvalidStrategy(other.to_string())),
        }
    }
}

/// Settings for the external structured-text-understanding service.
#[derive(Clone)]
pub struct DelegatedConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Only this many leading characters of the document are sent.
    pub max_prompt_chars: usize,
}

impl std::fmt::Debug for DelegatedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatedConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_prompt_chars", &self.max_prompt_chars)
            .finish()
    }
}

impl Default for DelegatedConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 45,
            max_prompt_chars: 60_000,
        }
    }
}

/// Effective runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub upload_dir: PathBuf,
    /// Base that relative source URLs (such as `/uploads/x.pdf`) are joined onto.
    pub public_base_url: String,
    pub body_limit_bytes: usize,
    pub max_source_bytes: usize,
    pub max_text_chars: usize,
    pub preview_chars: usize,
    /// Primary PDF output shorter than this many characters triggers the fallback.
    pub pdf_fallback_threshold: usize,
    pub fetch_timeout_secs: u64,
    pub strategy: StrategyChoice,
    pub delegated: DelegatedConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            upload_dir: PathBuf::from("public/uploads"),
            public_base_url: "http://127.0.0.1:3000".to_string(),
            body_limit_bytes: 30 * MB,
            max_source_bytes: 25 * MB,
            max_text_chars: 200_000,
            preview_chars: 4_000,
            pdf_fallback_threshold: 50,
            fetch_timeout_secs: 30,
            strategy: StrategyChoice::Auto,
            delegated: DelegatedConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, overlaid by the TOML cascade, overlaid by process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_file(&config_file::load_config())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values present in a parsed config file.
    pub fn apply_file(&mut self, file: &ConfigFile) -> Result<(), ConfigError> {
        if let Some(server) = &file.server {
            if let Some(bind) = &server.bind {
                self.bind = bind.clone();
            }
            if let Some(mb) = server.body_limit_mb {
                self.body_limit_bytes = mb * MB;
            }
            if let Some(dir) = &server.upload_dir {
                self.upload_dir = PathBuf::from(dir);
            }
            if let Some(url) = &server.public_base_url {
                self.public_base_url = url.clone();
            }
        }
        if let Some(extraction) = &file.extraction {
            if let Some(v) = extraction.max_text_chars {
                self.max_text_chars = v;
            }
            if let Some(v) = extraction.preview_chars {
                self.preview_chars = v;
            }
            if let Some(v) = extraction.pdf_fallback_threshold {
                self.pdf_fallback_threshold = v;
            }
            if let Some(mb) = extraction.max_source_mb {
                self.max_source_bytes = mb * MB;
            }
            if let Some(v) = extraction.fetch_timeout_secs {
                self.fetch_timeout_secs = v;
            }
            if let Some(s) = &extraction.strategy {
                self.strategy = s.parse()?;
            }
        }
        if let Some(delegated) = &file.delegated {
            if let Some(key) = &delegated.api_key {
                self.delegated.api_key = non_empty(key);
            }
            if let Some(url) = &delegated.base_url {
                self.delegated.base_url = url.clone();
            }
            if let Some(model) = &delegated.model {
                self.delegated.model = model.clone();
            }
            if let Some(v) = delegated.timeout_secs {
                self.delegated.timeout_secs = v;
            }
            if let Some(v) = delegated.max_prompt_chars {
                self.delegated.max_prompt_chars = v;
            }
        }
        Ok(())
    }

    /// Overlay environment variables, read through `lookup` so tests can
    /// supply a map instead of the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = lookup("NEPI_BIND") {
            self.bind = v;
        }
        if let Some(v) = lookup("NEPI_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("NEPI_PUBLIC_BASE_URL") {
            self.public_base_url = v;
        }
        if let Some(v) = lookup("NEPI_STRATEGY") {
            self.strategy = v.parse()?;
        }
        if let Some(v) = lookup("OPENAI_API_KEY") {
            self.delegated.api_key = non_empty(&v);
        }
        if let Some(v) = lookup("OPENAI_BASE_URL") {
            self.delegated.base_url = v;
        }
        if let Some(v) = lookup("OPENAI_MODEL") {
            self.delegated.model = v;
        }
        Ok(())
    }

    /// Whether the delegated strategy should run, given the configured choice.
    pub fn use_delegated(&self) -> Result<bool, ConfigError> {
        match self.strategy {
            StrategyChoice::Auto => Ok(self.delegated.api_key.is_some()),
            StrategyChoice::Heuristic => Ok(false),
            StrategyChoice::Delegated if self.delegated.api_key.is_some() => Ok(true),
            StrategyChoice::Delegated => Err(ConfigError::MissingApiKey),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
