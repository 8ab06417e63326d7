use serde::{Deserialize, Serialize};

pub mod backend;
pub mod config;
pub mod config_file;
pub mod error;

// Re-export for convenience
pub use backend::{BackendError, PdfBackend};
pub use config::{Config, DelegatedConfig, StrategyChoice};
pub use error::{ConfigError, IntakeError};

/// Media type used when neither the upload nor the remote server declares one.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A file resolved from an inbound request, held entirely in memory.
///
/// `bytes` is never empty and `filename` always has a value; the resolvers
/// substitute a synthetic name when none can be derived.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub bytes: Vec<u8>,
    pub declared_media_type: String,
    pub filename: String,
}

impl LoadedFile {
    pub fn new(
        bytes: Vec<u8>,
        declared_media_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Result<Self, IntakeError> {
        if bytes.is_empty() {
            return Err(IntakeError::EmptySource);
        }
        let declared_media_type = declared_media_type.into();
        let filename = filename.into();
        Ok(Self {
            bytes,
            declared_media_type: if declared_media_type.trim().is_empty() {
                OCTET_STREAM.to_string()
            } else {
                declared_media_type
            },
            filename: if filename.trim().is_empty() {
                "upload".to_string()
            } else {
                filename
            },
        })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn meta(&self) -> FileMeta {
        FileMeta {
            filename: self.filename.clone(),
            content_type: self.declared_media_type.clone(),
            size: self.bytes.len(),
        }
    }
}

/// How the text of a document was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtractionMethod {
    /// PDF text-layer extraction.
    Primary,
    /// Page-by-page PDF walk, adopted when the primary output was too thin.
    Fallback,
    /// CSV or plain text decoded as UTF-8.
    RawDecode,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Primary => "primary",
            ExtractionMethod::Fallback => "fallback",
            ExtractionMethod::RawDecode => "rawDecode",
        }
    }
}

/// Text pulled out of a document, capped at the configured processing limit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub raw_text: String,
    pub method: ExtractionMethod,
    /// Set when `raw_text` was cut at the processing limit.
    pub truncated: bool,
}

/// Audit facts recognised in a document.
///
/// Every field is optional. The heuristic rules fill the meter, quantity and
/// PV fields; the delegated service may additionally fill the site, billing
/// and risk fields. An all-`None` record is valid and serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nmi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electricity_kwh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_mj: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_kl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissions_tco2e: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_pv: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_period_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_period_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_area_m2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risks: Option<Vec<String>>,
}

impl KeyInfo {
    /// True when no field was recognised.
    pub fn is_empty(&self) -> bool {
        *self == KeyInfo::default()
    }

    /// Number of populated fields.
    pub fn populated(&self) -> usize {
        [
            self.nmi.is_some(),
            self.mirn.is_some(),
            self.electricity_kwh.is_some(),
            self.gas_mj.is_some(),
            self.water_kl.is_some(),
            self.emissions_tco2e.is_some(),
            self.has_pv.is_some(),
            self.site_name.is_some(),
            self.site_address.is_some(),
            self.billing_period_start.is_some(),
            self.billing_period_end.is_some(),
            self.floor_area_m2.is_some(),
            self.operating_hours.is_some(),
            self.risks.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

/// File metadata echoed back in every response that resolved a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
}

/// The wire response of the extraction endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<FileMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_chars: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<ExtractionMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_info: Option<KeyInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResponse {
    /// A failed response carrying only the error message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }
}
