use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("PDF backend panicked: {0}")]
    Panicked(String),
}

/// Trait for PDF text extraction backends.
///
/// Implementors turn an in-memory PDF into plain text. The choice between a
/// primary and a fallback backend, and the rules for adopting the fallback's
/// output, live in `nepi_ingest::TextExtractor`.
pub trait PdfBackend: Send + Sync {
    /// Short name used in logs (e.g. "pdf-extract").
    fn name(&self) -> &str;

    /// Extract the full text content of a PDF held in memory.
    fn extract_text(&self, data: &[u8]) -> Result<String, BackendError>;
}
