use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use axum::extract::Multipart;
use nepi_core::{IntakeError, OCTET_STREAM};

use crate::error::ApiError;

/// A file part from a multipart form.
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Parsed form fields from a multipart submission.
#[derive(Default)]
pub struct FormFields {
    pub file: Option<UploadedFile>,
    /// `url`, or `blobUrl` when `url` is absent.
    pub url: Option<String>,
}

/// Parse a multipart form into the fields the intake endpoints understand.
/// Unknown fields are drained and ignored.
pub async fn parse_multipart(mut multipart: Multipart) -> Result<FormFields, ApiError> {
    let mut fields = FormFields::default();
    let mut blob_url = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), format!("Failed to read form field: {}", e.body_text())))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().unwrap_or(OCTET_STREAM).to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::new(e.status(), format!("Failed to read file data: {}", e.body_text())))?
                    .to_vec();

                // Browsers submit an empty, unnamed part for an untouched file input.
                if data.is_empty() && filename.is_empty() {
                    continue;
                }
                fields.file = Some(UploadedFile {
                    filename,
                    content_type,
                    data,
                });
            }
            "url" | "blobUrl" => {
                let val = field
                    .text()
                    .await
                    .map_err(|e| ApiError::new(e.status(), format!("Failed to read {name}: {}", e.body_text())))?;
                let val = val.trim().to_string();
                if val.is_empty() {
                    continue;
                }
                if name == "url" {
                    fields.url = Some(val);
                } else {
                    blob_url = Some(val);
                }
            }
            _ => {
                let _ = field.bytes().await;
            }
        }
    }

    fields.url = fields.url.or(blob_url);
    Ok(fields)
}

/// Stores uploaded bytes and hands back a URL the extraction endpoint accepts.
pub trait BlobStore: Send + Sync {
    fn store<'a>(
        &'a self,
        filename: &'a str,
        bytes: &'a [u8],
        content_type: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, IntakeError>> + Send + 'a>>;
}

/// Writes uploads into a local directory served under `/uploads`.
///
/// A later upload with the same sanitized name replaces the earlier file.
pub struct LocalBlobStore {
    dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl BlobStore for LocalBlobStore {
    fn store<'a>(
        &'a self,
        filename: &'a str,
        bytes: &'a [u8],
        content_type: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, IntakeError>> + Send + 'a>> {
        Box::pin(async move {
            let name = sanitize_filename(filename);
            tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
                IntakeError::Unexpected(format!("cannot create {}: {e}", self.dir.display()))
            })?;
            let path = self.dir.join(&name);
            tokio::fs::write(&path, bytes)
                .await
                .map_err(|e| IntakeError::Unexpected(format!("cannot write {}: {e}", path.display())))?;
            tracing::info!(
                path = %path.display(),
                size = bytes.len(),
                content_type,
                "stored upload"
            );
            Ok(format!("/uploads/{}", urlencoding::encode(&name)))
        })
    }
}

/// Reduce a client-supplied filename to a single safe path component.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\bills\\Q1.pdf"), "Q1.pdf");
    }

    #[test]
    fn keeps_ordinary_names() {
        assert_eq!(sanitize_filename("Q1 bill (final).pdf"), "Q1 bill (final).pdf");
    }

    #[test]
    fn replaces_odd_characters() {
        assert_eq!(sanitize_filename("a?b*c.pdf"), "a_b_c.pdf");
    }

    #[test]
    fn hidden_and_empty_names_get_placeholder() {
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename(".env"), "env");
    }

    #[tokio::test]
    async fn local_store_writes_and_encodes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("uploads"));
        let url = store.store("Q1 bill.pdf", b"%PDF-1.4", "application/pdf").await.unwrap();
        assert_eq!(url, "/uploads/Q1%20bill.pdf");
        let written = std::fs::read(dir.path().join("uploads").join("Q1 bill.pdf")).unwrap();
        assert_eq!(written, b"%PDF-1.4");
    }
}
