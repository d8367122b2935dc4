//! Per-field format rules and cross-field relationship rules.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trawl_core::Record;

static PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[$€£]?\s*(\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?$").expect("price regex is valid")
});

static WEIGHT_LB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*lbs?$").expect("weight regex is valid"));

static WEIGHT_ANY_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*(kg|kgs|g|grams?|oz|ounces?|pounds?)$")
        .expect("unit regex is valid")
});

/// Outcome of checking one value against a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    Valid,
    /// Acceptable value with a non-fatal concern
    Suspicious(String),
    Invalid(String),
}

impl Check {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid(_))
    }
}

/// Expected shape of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatRule {
    /// Non-negative number, optionally with a currency sign and thousands separators
    Price,
    /// `<number> LB`
    WeightLb,
    /// One or more absolute `http`/`https` URLs
    HttpUrls,
    /// Non-empty tokens separated by `|`
    PipeList,
}

impl FormatRule {
    pub fn check(self, value: &Value) -> Check {
        match self {
            Self::Price => check_price(value),
            Self::WeightLb => check_weight(value),
            Self::HttpUrls => check_urls(value),
            Self::PipeList => check_pipe_list(value),
        }
    }
}

fn check_price(value: &Value) -> Check {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if !PRICE.is_match(s) {
                return Check::Invalid(format!("'{s}' is not a numeric price"));
            }
            s.trim_start_matches(['$', '€', '£'])
                .trim()
                .replace(',', "")
                .parse::<f64>()
                .ok()
        }
        _ => None,
    };
    match amount {
        None => Check::Invalid("price is not a number".to_string()),
        Some(a) if a <= 0.0 => Check::Suspicious(format!("price {a} is not positive")),
        Some(_) => Check::Valid,
    }
}

fn check_weight(value: &Value) -> Check {
    let Some(text) = value.as_str().map(str::trim) else {
        return Check::Invalid("weight is not text".to_string());
    };
    if WEIGHT_LB.is_match(text) {
        Check::Valid
    } else if WEIGHT_ANY_UNIT.is_match(text) {
        Check::Invalid(format!("weight '{text}' is not in pounds"))
    } else {
        Check::Invalid(format!("weight '{text}' does not match '<number> LB'"))
    }
}

fn check_urls(value: &Value) -> Check {
    let urls: Vec<&str> = match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => return Check::Invalid("images are not a URL list".to_string()),
    };
    if urls.is_empty() {
        return Check::Invalid("no image URLs".to_string());
    }
    for raw in urls {
        match url::Url::parse(raw) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            _ => return Check::Invalid(format!("'{raw}' is not an http(s) URL")),
        }
    }
    Check::Valid
}

fn check_pipe_list(value: &Value) -> Check {
    let Some(text) = value.as_str() else {
        return Check::Invalid("expected a pipe-separated string".to_string());
    };
    if pipe_tokens(text).any(str::is_empty) {
        Check::Invalid(format!("'{text}' has empty tokens"))
    } else {
        Check::Valid
    }
}

fn pipe_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split('|').map(str::trim)
}

/// Leading number of a weight string such as `"0.625 lb"`.
pub fn weight_value(text: &str) -> Option<f64> {
    let text = text.trim();
    WEIGHT_LB
        .captures(text)
        .or_else(|| WEIGHT_ANY_UNIT.captures(text))
        .and_then(|c| c[1].parse().ok())
}

/// Cross-field consistency rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipRule {
    /// The cross-sell list must not name the record's own SKU
    CrossSellExcludesSku,
    /// Images are only meaningful alongside a product name
    ImagesRequireName,
    /// A parsed weight must be greater than zero
    WeightPositive,
}

impl RelationshipRule {
    /// `None` when the fields the rule relates are absent.
    pub fn check(self, record: &Record) -> Option<Check> {
        match self {
            Self::CrossSellExcludesSku => {
                let sku = text_field(record, "sku")?;
                let cross_sell = text_field(record, "cross_sell")?;
                Some(if pipe_tokens(cross_sell).any(|t| t == sku.trim()) {
                    Check::Invalid(format!("cross_sell lists the record's own SKU {sku}"))
                } else {
                    Check::Valid
                })
            }
            Self::ImagesRequireName => {
                if !is_present(record.get("image_urls")) {
                    return None;
                }
                Some(if is_present(record.get("name")) {
                    Check::Valid
                } else {
                    Check::Invalid("images present without a product name".to_string())
                })
            }
            Self::WeightPositive => {
                let weight = text_field(record, "weight")?;
                Some(match weight_value(weight) {
                    Some(w) if w > 0.0 => Check::Valid,
                    Some(w) => Check::Invalid(format!("weight {w} is not positive")),
                    None => Check::Invalid(format!("weight '{weight}' has no number")),
                })
            }
        }
    }
}

fn text_field<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Whether a field carries a usable value.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}
