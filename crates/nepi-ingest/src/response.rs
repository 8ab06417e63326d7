use nepi_core::{ExtractedText, ExtractionResponse, FileMeta, IntakeError};
use nepi_facts::Facts;

use crate::text::truncate_chars;

pub const UNSUPPORTED_NOTE: &str =
    "Unsupported file type for text extraction; only PDF/CSV/TXT handled.";

/// Successful response for a file whose text and facts were extracted.
pub fn assemble(
    meta: FileMeta,
    text: &ExtractedText,
    facts: Facts,
    preview_chars: usize,
) -> ExtractionResponse {
    let (preview, _) = truncate_chars(&text.raw_text, preview_chars);
    let preview_len = preview.chars().count();

    let truncation_note = text.truncated.then(|| {
        format!(
            "Document text was truncated to {} characters before analysis.",
            text.raw_text.chars().count()
        )
    });
    let note = match (facts.note, truncation_note) {
        (Some(a), Some(b)) => Some(format!("{a} {b}")),
        (a, b) => a.or(b),
    };

    ExtractionResponse {
        ok: true,
        meta: Some(meta),
        preview: Some(preview.to_string()),
        preview_chars: Some(preview_len),
        truncated: Some(text.truncated),
        extraction_method: Some(text.method),
        key_info: Some(facts.key_info),
        note,
        error: None,
    }
}

/// Successful response for a file the text extractor cannot handle. Carries
/// no preview and no `keyInfo`.
pub fn unsupported(meta: FileMeta) -> ExtractionResponse {
    ExtractionResponse {
        ok: true,
        meta: Some(meta),
        note: Some(UNSUPPORTED_NOTE.to_string()),
        ..ExtractionResponse::default()
    }
}

/// Failed response for `err`.
pub fn failure(err: &IntakeError) -> ExtractionResponse {
    ExtractionResponse::failure(err.to_string())
}
