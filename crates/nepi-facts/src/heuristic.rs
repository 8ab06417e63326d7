use std::future::Future;
use std::pin::Pin;

use nepi_core::{IntakeError, KeyInfo};

use crate::rules::{DEFAULT_RULES, Rule, apply_rules};
use crate::{FactExtractionStrategy, Facts};

/// Pattern-matching fact extraction. Pure: identical text always yields an
/// identical record.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicStrategy {
    rules: &'static [Rule],
}

impl Default for HeuristicStrategy {
    fn default() -> Self {
        Self {
            rules: &DEFAULT_RULES,
        }
    }
}

impl HeuristicStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract_key_info(&self, text: &str) -> KeyInfo {
        apply_rules(self.rules, text)
    }
}

impl FactExtractionStrategy for HeuristicStrategy {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn extract<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Facts, IntakeError>> + Send + 'a>> {
        Box::pin(async move { Ok(Facts::new(self.extract_key_info(text))) })
    }
}
