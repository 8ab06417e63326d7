use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use nepi_core::{IntakeError, KeyInfo};
use once_cell::sync::Lazy;
use serde_json::{Map, Value, json};

use crate::completion::{CompletionError, CompletionService};
use crate::rules::parse_quantity;
use crate::{FactExtractionStrategy, Facts};

const SYSTEM_PROMPT: &str = "You extract facts from energy, gas and water bills and audit \
documents for childcare centres. Only report values that appear in the document. Use null \
for anything not stated. Quantities are plain numbers without units or separators. Dates \
are ISO 8601 (YYYY-MM-DD).";

pub(crate) const MALFORMED_NOTE: &str =
    "Delegated extraction returned malformed output; no fields were extracted.";

/// The field schema sent with every request.
static SCHEMA_HINT: Lazy<Value> = Lazy::new(|| {
    json!({
        "nmi": "string | null (electricity National Meter Identifier)",
        "mirn": "string | null (gas Meter Installation Registration Number)",
        "electricity_kwh": "number | null",
        "gas_mj": "number | null",
        "water_kl": "number | null",
        "emissions_tco2e": "number | null",
        "has_pv": "boolean | null (solar PV / inverter present)",
        "site_name": "string | null",
        "site_address": "string | null",
        "billing_period_start": "string | null",
        "billing_period_end": "string | null",
        "floor_area_m2": "number | null",
        "operating_hours": "number | null (weekly opening hours)",
        "risks": "string[] | null (energy or compliance risks noted)"
    })
});

/// Fact extraction through an external structured-text-understanding service.
///
/// Sends a bounded prefix of the text. Transport failures and non-2xx replies
/// fail the request; an empty or undecodable reply, or content that is not a
/// JSON object, degrades to an empty record.
pub struct DelegatedStrategy {
    service: Arc<dyn CompletionService>,
    max_prompt_chars: usize,
}

impl DelegatedStrategy {
    pub fn new(service: Arc<dyn CompletionService>, max_prompt_chars: usize) -> Self {
        Self {
            service,
            max_prompt_chars,
        }
    }

    pub fn schema_hint() -> &'static Value {
        &SCHEMA_HINT
    }

    fn user_prompt(&self, text: &str) -> String {
        let body: String = text.chars().take(self.max_prompt_chars).collect();
        format!("Document text:\n\n{body}")
    }
}

impl FactExtractionStrategy for DelegatedStrategy {
    fn name(&self) -> &str {
        "delegated"
    }

    fn extract<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Facts, IntakeError>> + Send + 'a>> {
        Box::pin(async move {
            let prompt = self.user_prompt(text);
            let raw = match self.service.complete(SYSTEM_PROMPT, &prompt, &SCHEMA_HINT).await {
                Ok(raw) => raw,
                Err(CompletionError::Malformed(reason)) => {
                    tracing::warn!(%reason, "delegated response unusable, returning empty record");
                    return Ok(Facts::default().with_note(MALFORMED_NOTE));
                }
                Err(CompletionError::Timeout(secs)) => {
                    return Err(IntakeError::Timeout {
                        stage: "delegated extraction",
                        secs,
                    });
                }
                Err(other) => return Err(IntakeError::Delegated(other.to_string())),
            };

            match parse_key_info(&raw) {
                Some(key_info) => Ok(Facts::new(key_info)),
                None => {
                    tracing::warn!(
                        response_len = raw.len(),
                        "delegated response is not a JSON object, returning empty record"
                    );
                    Ok(Facts::default().with_note(MALFORMED_NOTE))
                }
            }
        })
    }
}

/// Remove a surrounding Markdown code fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a delegated response into a [`KeyInfo`].
///
/// Returns `None` when the payload is not a JSON object. Individual fields of
/// the wrong shape are dropped rather than failing the record: numbers must
/// be finite (numeric strings are accepted), identifiers must be non-empty.
/// A response wrapped as `{"keyInfo": {...}}` is unwrapped.
pub fn parse_key_info(raw: &str) -> Option<KeyInfo> {
    let value: Value = serde_json::from_str(strip_code_fence(raw)).ok()?;
    let obj = match value {
        Value::Object(mut obj) => match obj.remove("keyInfo") {
            Some(Value::Object(inner)) => inner,
            Some(other) => {
                obj.insert("keyInfo".to_string(), other);
                obj
            }
            None => obj,
        },
        _ => return None,
    };

    Some(KeyInfo {
        nmi: identifier(&obj, "nmi"),
        mirn: identifier(&obj, "mirn"),
        electricity_kwh: number(&obj, "electricity_kwh"),
        gas_mj: number(&obj, "gas_mj"),
        water_kl: number(&obj, "water_kl"),
        emissions_tco2e: number(&obj, "emissions_tco2e"),
        has_pv: flag(&obj, "has_pv"),
        site_name: string(&obj, "site_name"),
        site_address: string(&obj, "site_address"),
        billing_period_start: string(&obj, "billing_period_start"),
        billing_period_end: string(&obj, "billing_period_end"),
        floor_area_m2: number(&obj, "floor_area_m2"),
        operating_hours: number(&obj, "operating_hours"),
        risks: string_list(&obj, "risks"),
    })
}

fn string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    let s = obj.get(key)?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn identifier(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_ascii_uppercase())
        }
        Value::Number(n) if n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_quantity(s.trim()),
        _ => None,
    }
}

fn flag(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    match obj.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn string_list(obj: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let items: Vec<String> = match obj.get(key)? {
        Value::Array(arr) => arr
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => return None,
    };
    (!items.is_empty()).then_some(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_object() {
        let raw = r#"{"nmi":"6305123456","electricity_kwh":1200,"has_pv":true,"site_name":"Little Sprouts","risks":["old HVAC"]}"#;
        let info = parse_key_info(raw).unwrap();
        assert_eq!(info.nmi.as_deref(), Some("6305123456"));
        assert_eq!(info.electricity_kwh, Some(1200.0));
        assert_eq!(info.has_pv, Some(true));
        assert_eq!(info.site_name.as_deref(), Some("Little Sprouts"));
        assert_eq!(info.risks, Some(vec!["old HVAC".to_string()]));
    }

    #[test]
    fn strips_code_fences() {
        let raw = "```json\n{\"gas_mj\": \"38,200\"}\n```";
        assert_eq!(parse_key_info(raw).unwrap().gas_mj, Some(38200.0));
    }

    #[test]
    fn unwraps_key_info_envelope() {
        let raw = r#"{"keyInfo": {"water_kl": 12.5}}"#;
        assert_eq!(parse_key_info(raw).unwrap().water_kl, Some(12.5));
    }

    #[test]
    fn nulls_and_bad_shapes_are_absent() {
        let raw = r#"{"nmi":null,"gas_mj":"n/a","has_pv":"maybe","risks":[],"site_name":"  ","mirn":5330098765}"#;
        let info = parse_key_info(raw).unwrap();
        assert!(info.nmi.is_none());
        assert!(info.gas_mj.is_none());
        assert!(info.has_pv.is_none());
        assert!(info.risks.is_none());
        assert!(info.site_name.is_none());
        assert_eq!(info.mirn.as_deref(), Some("5330098765"));
    }

    #[test]
    fn non_object_is_malformed() {
        assert!(parse_key_info("Sorry, I can't help with that.").is_none());
        assert!(parse_key_info("[1, 2, 3]").is_none());
        assert!(parse_key_info("{\"nmi\": ").is_none());
    }

    #[test]
    fn prompt_is_bounded() {
        struct Never;
        impl CompletionService for Never {
            fn complete<'a>(
                &'a self,
                _s: &'a str,
                _u: &'a str,
                _h: &'a Value,
            ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>> {
                Box::pin(async { Err(CompletionError::Transport("unused".into())) })
            }
        }
        let strategy = DelegatedStrategy::new(Arc::new(Never), 10);
        let prompt = strategy.user_prompt(&"x".repeat(1_000));
        assert!(prompt.ends_with(&"x".repeat(10)));
        assert!(!prompt.ends_with(&"x".repeat(11)));
    }

    #[test]
    fn schema_lists_canonical_fields() {
        let schema = DelegatedStrategy::schema_hint();
        for key in ["nmi", "mirn", "electricity_kwh", "has_pv", "risks", "floor_area_m2"] {
            assert!(schema.get(key).is_some(), "missing {key}");
        }
    }
}
