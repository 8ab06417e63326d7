use std::sync::Arc;

use nepi_core::{ExtractedText, ExtractionMethod, LoadedFile, PdfBackend};
use nepi_pdf::{LopdfBackend, PdfExtractBackend};

use crate::classify::{FileKind, classify};

/// Result of running a file through the text extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum TextOutcome {
    Extracted(ExtractedText),
    /// The file is neither PDF, CSV nor plain text.
    Unsupported,
}

/// Turns loaded files into plain text.
///
/// PDFs go through `primary` first. `fallback` runs only when the primary
/// backend fails or yields fewer than `fallback_threshold` non-whitespace
/// characters, and its output is adopted only when strictly longer. Neither
/// backend failing is fatal; the worst case is empty text.
///
/// Everything here is blocking. Async callers should use
/// [`tokio::task::spawn_blocking`].
pub struct TextExtractor {
    primary: Arc<dyn PdfBackend>,
    fallback: Arc<dyn PdfBackend>,
    fallback_threshold: usize,
    max_chars: usize,
}

impl TextExtractor {
    pub fn new(
        primary: Arc<dyn PdfBackend>,
        fallback: Arc<dyn PdfBackend>,
        fallback_threshold: usize,
        max_chars: usize,
    ) -> Self {
        Self {
            primary,
            fallback,
            fallback_threshold,
            max_chars,
        }
    }

    /// pdf-extract as primary, lopdf page walk as fallback.
    pub fn with_default_backends(fallback_threshold: usize, max_chars: usize) -> Self {
        Self::new(
            Arc::new(PdfExtractBackend),
            Arc::new(LopdfBackend::default()),
            fallback_threshold,
            max_chars,
        )
    }

    pub fn extract(&self, file: &LoadedFile) -> TextOutcome {
        let kind = classify(&file.declared_media_type, &file.filename);
        let (text, method) = match kind {
            FileKind::Pdf => self.extract_pdf(&file.bytes),
            FileKind::Csv | FileKind::Text => (decode_utf8(&file.bytes), ExtractionMethod::RawDecode),
            FileKind::Unsupported => {
                tracing::info!(
                    filename = %file.filename,
                    content_type = %file.declared_media_type,
                    "unsupported file type, skipping text extraction"
                );
                return TextOutcome::Unsupported;
            }
        };

        let (capped, truncated) = truncate_chars(&text, self.max_chars);
        if truncated {
            tracing::info!(
                filename = %file.filename,
                max_chars = self.max_chars,
                "extracted text truncated"
            );
        }
        TextOutcome::Extracted(ExtractedText {
            raw_text: capped.to_string(),
            method,
            truncated,
        })
    }

    fn extract_pdf(&self, data: &[u8]) -> (String, ExtractionMethod) {
        let primary = match self.primary.extract_text(data) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(backend = self.primary.name(), error = %e, "primary PDF extraction failed");
                return (self.run_fallback(data), ExtractionMethod::Fallback);
            }
        };

        let primary_len = significant_chars(&primary);
        if primary_len >= self.fallback_threshold {
            return (primary, ExtractionMethod::Primary);
        }

        tracing::debug!(
            chars = primary_len,
            threshold = self.fallback_threshold,
            "primary PDF text below threshold, trying fallback"
        );
        let fallback = self.run_fallback(data);
        if significant_chars(&fallback) > primary_len {
            (fallback, ExtractionMethod::Fallback)
        } else {
            (primary, ExtractionMethod::Primary)
        }
    }

    fn run_fallback(&self, data: &[u8]) -> String {
        match self.fallback.extract_text(data) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(backend = self.fallback.name(), error = %e, "fallback PDF extraction failed");
                String::new()
            }
        }
    }
}

fn significant_chars(text: &str) -> usize {
    text.trim().chars().count()
}

/// Lossy UTF-8 decode with any leading byte-order mark removed.
fn decode_utf8(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{FEFF}').unwrap_or(&text).to_string()
}

/// Cut `text` after `max` characters, reporting whether anything was dropped.
pub fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}
