use std::sync::Arc;

use nepi_core::{Config, ConfigError, ExtractionResponse, IntakeError, LoadedFile};
use nepi_facts::{FactExtractionStrategy, build_strategy};

use crate::response::{assemble, unsupported};
use crate::text::{TextExtractor, TextOutcome};

/// Text extraction, fact extraction and response assembly for one file.
///
/// Cheap to share; all request state lives on the stack of [`Pipeline::process`].
pub struct Pipeline {
    text: Arc<TextExtractor>,
    facts: Arc<dyn FactExtractionStrategy>,
    preview_chars: usize,
}

impl Pipeline {
    pub fn new(
        text: TextExtractor,
        facts: Arc<dyn FactExtractionStrategy>,
        preview_chars: usize,
    ) -> Self {
        Self {
            text: Arc::new(text),
            facts,
            preview_chars,
        }
    }

    pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Self, ConfigError> {
        let text = TextExtractor::with_default_backends(
            config.pdf_fallback_threshold,
            config.max_text_chars,
        );
        let facts = build_strategy(config, client)?;
        Ok(Self::new(text, facts, config.preview_chars))
    }

    pub fn strategy_name(&self) -> &str {
        self.facts.name()
    }

    /// Run `file` through the pipeline. The file's bytes are dropped once
    /// text extraction finishes.
    pub async fn process(&self, file: LoadedFile) -> Result<ExtractionResponse, IntakeError> {
        let meta = file.meta();
        tracing::info!(
            filename = %meta.filename,
            content_type = %meta.content_type,
            size = meta.size,
            "processing document"
        );

        let extractor = Arc::clone(&self.text);
        let outcome = tokio::task::spawn_blocking(move || extractor.extract(&file))
            .await
            .map_err(|e| IntakeError::Unexpected(format!("text extraction task failed: {e}")))?;

        let text = match outcome {
            TextOutcome::Extracted(text) => text,
            TextOutcome::Unsupported => return Ok(unsupported(meta)),
        };
        tracing::debug!(
            chars = text.raw_text.chars().count(),
            method = text.method.as_str(),
            truncated = text.truncated,
            "text extracted"
        );

        let facts = self.facts.extract(&text.raw_text).await?;
        tracing::info!(
            filename = %meta.filename,
            strategy = self.facts.name(),
            fields = facts.key_info.populated(),
            "facts extracted"
        );

        Ok(assemble(meta, &text, facts, self.preview_chars))
    }
}
