//! PDF text backends.
//!
//! Two pure-Rust implementations of [`PdfBackend`]:
//!
//! - [`PdfExtractBackend`] reads the whole text layer in one pass with the
//!   `pdf-extract` crate. It handles most utility bills well and is the
//!   primary method.
//! - [`LopdfBackend`] walks the document page by page with `lopdf` and
//!   concatenates the text content of each page, skipping pages it cannot
//!   decode. It copes with documents whose fonts trip up the primary method.
//!
//! Both backends convert panics from the underlying parser into
//! [`BackendError::Panicked`], so a malformed upload can never take down the
//! request task.

use std::panic::{AssertUnwindSafe, catch_unwind};

use lopdf::Document;
use nepi_core::{BackendError, PdfBackend};

/// Run a parser call, turning a panic into a [`BackendError`].
fn guarded<T>(
    backend: &str,
    f: impl FnOnce() -> Result<T, BackendError>,
) -> Result<T, BackendError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::warn!(backend, %message, "PDF parser panicked");
            Err(BackendError::Panicked(message))
        }
    }
}

/// Whole-document text-layer extraction via `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractBackend;

impl PdfExtractBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfBackend for PdfExtractBackend {
    fn name(&self) -> &str {
        "pdf-extract"
    }

    fn extract_text(&self, data: &[u8]) -> Result<String, BackendError> {
        guarded(self.name(), || {
            pdf_extract::extract_text_from_mem(data)
                .map_err(|e| BackendError::ExtractionError(e.to_string()))
        })
    }
}

/// Page-by-page text-content walk via `lopdf`. Pages are joined by newlines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfBackend;

impl LopdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfBackend for LopdfBackend {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn extract_text(&self, data: &[u8]) -> Result<String, BackendError> {
        guarded(self.name(), || {
            let document =
                Document::load_mem(data).map_err(|e| BackendError::OpenError(e.to_string()))?;

            let mut pages_text = Vec::new();
            for page_number in document.get_pages().keys() {
                // One undecodable page must not cost the rest of the document.
                match document.extract_text(&[*page_number]) {
                    Ok(text) => pages_text.push(text),
                    Err(e) => {
                        tracing::debug!(page = *page_number, error = %e, "skipping unreadable page");
                    }
                }
            }

            Ok(pages_text.join("\n"))
        })
    }
}
