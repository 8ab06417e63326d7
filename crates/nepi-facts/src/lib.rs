use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use nepi_core::{Config, ConfigError, IntakeError, KeyInfo};

pub mod completion;
pub mod delegated;
pub mod heuristic;
pub mod rules;

pub use completion::{CompletionError, CompletionService, OpenAiCompletion};
pub use delegated::{DelegatedStrategy, parse_key_info};
pub use heuristic::HeuristicStrategy;
pub use rules::{DEFAULT_RULES, Field, FieldValue, Rule};

/// Output of a fact extraction pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facts {
    pub key_info: KeyInfo,
    /// Set when the pass degraded (e.g. an unparseable delegated response).
    pub note: Option<String>,
}

impl Facts {
    pub fn new(key_info: KeyInfo) -> Self {
        Self {
            key_info,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Turns extracted text into a [`KeyInfo`] record.
///
/// Selected once at startup and shared across requests, so implementations
/// must not keep per-request state.
pub trait FactExtractionStrategy: Send + Sync {
    /// Short name used in logs ("heuristic", "delegated").
    fn name(&self) -> &str;

    fn extract<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Facts, IntakeError>> + Send + 'a>>;
}

/// Build the strategy the configuration asks for.
pub fn build_strategy(
    config: &Config,
    client: reqwest::Client,
) -> Result<Arc<dyn FactExtractionStrategy>, ConfigError> {
    if config.use_delegated()? {
        let service = OpenAiCompletion::from_config(&config.delegated, client)?;
        tracing::info!(model = %config.delegated.model, "using delegated fact extraction");
        Ok(Arc::new(DelegatedStrategy::new(
            Arc::new(service),
            config.delegated.max_prompt_chars,
        )))
    } else {
        tracing::info!("using heuristic fact extraction");
        Ok(Arc::new(HeuristicStrategy::new()))
    }
}
