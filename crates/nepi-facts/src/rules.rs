//! The heuristic rule table.
//!
//! Each [`Rule`] pairs one [`Field`] with a pattern and a normalizer. Rules
//! are evaluated independently against the full text; a rule yields the
//! first match (in document order) that survives normalization, or nothing.

use nepi_core::KeyInfo;
use once_cell::sync::Lazy;
use regex::Regex;

/// A `KeyInfo` field the heuristic rules can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Nmi,
    Mirn,
    ElectricityKwh,
    GasMj,
    WaterKl,
    EmissionsTco2e,
    HasPv,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Nmi => "nmi",
            Field::Mirn => "mirn",
            Field::ElectricityKwh => "electricity_kwh",
            Field::GasMj => "gas_mj",
            Field::WaterKl => "water_kl",
            Field::EmissionsTco2e => "emissions_tco2e",
            Field::HasPv => "has_pv",
        }
    }

    fn is_set(&self, info: &KeyInfo) -> bool {
        match self {
            Field::Nmi => info.nmi.is_some(),
            Field::Mirn => info.mirn.is_some(),
            Field::ElectricityKwh => info.electricity_kwh.is_some(),
            Field::GasMj => info.gas_mj.is_some(),
            Field::WaterKl => info.water_kl.is_some(),
            Field::EmissionsTco2e => info.emissions_tco2e.is_some(),
            Field::HasPv => info.has_pv.is_some(),
        }
    }

    /// Store `value` if its kind fits this field. Returns whether it was stored.
    pub fn assign(&self, info: &mut KeyInfo, value: FieldValue) -> bool {
        match (self, value) {
            (Field::Nmi, FieldValue::Text(s)) => info.nmi = Some(s),
            (Field::Mirn, FieldValue::Text(s)) => info.mirn = Some(s),
            (Field::ElectricityKwh, FieldValue::Number(n)) => info.electricity_kwh = Some(n),
            (Field::GasMj, FieldValue::Number(n)) => info.gas_mj = Some(n),
            (Field::WaterKl, FieldValue::Number(n)) => info.water_kl = Some(n),
            (Field::EmissionsTco2e, FieldValue::Number(n)) => info.emissions_tco2e = Some(n),
            (Field::HasPv, FieldValue::Flag(b)) => info.has_pv = Some(b),
            _ => return false,
        }
        true
    }
}

/// A normalized value produced by a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

/// One row of the rule table: field, matcher, normalizer.
pub struct Rule {
    pub field: Field,
    pattern: &'static Lazy<Regex>,
    normalize: fn(&str) -> Option<FieldValue>,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("field", &self.field)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

impl Rule {
    pub const fn new(
        field: Field,
        pattern: &'static Lazy<Regex>,
        normalize: fn(&str) -> Option<FieldValue>,
    ) -> Self {
        Self {
            field,
            pattern,
            normalize,
        }
    }

    /// Evaluate against `text`, returning the first match that normalizes.
    ///
    /// Capture group 1 is handed to the normalizer when the pattern has one,
    /// otherwise the whole match is.
    pub fn evaluate(&self, text: &str) -> Option<FieldValue> {
        self.pattern.captures_iter(text).find_map(|caps| {
            let raw = caps.get(1).or_else(|| caps.get(0))?.as_str();
            (self.normalize)(raw)
        })
    }
}

/// A decimal number, optionally grouped in thousands by commas or spaces.
/// Periods are decimal points.
const NUMBER: &str = r"(\d{1,3}(?:[, \u{00A0}\u{202F}]\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)";

fn quantity_pattern(unit: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{NUMBER}\s*{unit}\b")).unwrap()
}

static NMI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bNMI(?:\s*(?:no\.?|number|#))?[\s:#.-]*([A-Z0-9]{6,})\b").unwrap()
});

static MIRN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bMIRN(?:\s*(?:no\.?|number|#))?[\s:#.-]*(\d{6,})\b").unwrap()
});

static KWH_RE: Lazy<Regex> = Lazy::new(|| quantity_pattern("kwh"));
static MJ_RE: Lazy<Regex> = Lazy::new(|| quantity_pattern("mj"));
static KL_RE: Lazy<Regex> = Lazy::new(|| quantity_pattern("kl"));
static TCO2E_RE: Lazy<Regex> = Lazy::new(|| quantity_pattern(r"t-?co(?:2|₂)-?e"));

static PV_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:pv|photovoltaics?|inverters?)\b").unwrap());

/// Meter identifiers must contain at least one digit; a label followed by a
/// plain word ("NMI Details") is not an identifier.
pub fn normalize_meter_id(raw: &str) -> Option<FieldValue> {
    let id = raw.trim();
    if id.len() < 6 || !id.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(FieldValue::Text(id.to_ascii_uppercase()))
}

/// Strip grouping separators and parse. Empty or non-numeric input is
/// absent, never zero.
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{00A0}' | '\u{202F}' | '_'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn normalize_quantity(raw: &str) -> Option<FieldValue> {
    parse_quantity(raw).map(FieldValue::Number)
}

pub fn normalize_presence(_raw: &str) -> Option<FieldValue> {
    Some(FieldValue::Flag(true))
}

/// The built-in rule table.
pub static DEFAULT_RULES: [Rule; 7] = [
    Rule::new(Field::Nmi, &NMI_RE, normalize_meter_id),
    Rule::new(Field::Mirn, &MIRN_RE, normalize_meter_id),
    Rule::new(Field::ElectricityKwh, &KWH_RE, normalize_quantity),
    Rule::new(Field::GasMj, &MJ_RE, normalize_quantity),
    Rule::new(Field::WaterKl, &KL_RE, normalize_quantity),
    Rule::new(Field::EmissionsTco2e, &TCO2E_RE, normalize_quantity),
    Rule::new(Field::HasPv, &PV_RE, normalize_presence),
];

/// Apply every rule in `rules` to `text`. When several rules target the same
/// field, the first one in table order that matches wins.
pub fn apply_rules(rules: &[Rule], text: &str) -> KeyInfo {
    let mut info = KeyInfo::default();
    for rule in rules {
        if rule.field.is_set(&info) {
            continue;
        }
        if let Some(value) = rule.evaluate(text) {
            if !rule.field.assign(&mut info, value) {
                tracing::debug!(field = rule.field.as_str(), "rule produced a value of the wrong kind");
            }
        }
    }
    info
}
