use std::path::Path;

/// Broad file categories the text extractor distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Csv,
    Text,
    Unsupported,
}

/// Classify by declared media type first, then by filename extension.
///
/// Media types are matched by substring (`application/pdf`, `text/csv`,
/// `text/plain; charset=utf-8` ...). Generic types such as
/// `application/octet-stream` fall through to the extension check.
pub fn classify(media_type: &str, filename: &str) -> FileKind {
    let media = media_type.to_ascii_lowercase();
    if media.contains("pdf") {
        return FileKind::Pdf;
    }
    if media.contains("csv") {
        return FileKind::Csv;
    }
    if media.contains("text") {
        return FileKind::Text;
    }

    match extension(filename).as_deref() {
        Some("pdf") => FileKind::Pdf,
        Some("csv") => FileKind::Csv,
        Some("txt") | Some("text") => FileKind::Text,
        _ => FileKind::Unsupported,
    }
}

/// Media type to declare for a local file when none is given.
pub fn guess_media_type(filename: &str) -> &'static str {
    match extension(filename).as_deref() {
        Some("pdf") => "application/pdf",
        Some("csv") => "text/csv",
        Some("txt") | Some("text") => "text/plain",
        Some("zip") => "application/zip",
        _ => nepi_core::OCTET_STREAM,
    }
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
