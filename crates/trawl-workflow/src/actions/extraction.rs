use crate::error::{StepError, StepResult};
use crate::params::{expect_str, str_param, string_list};
use crate::registry::{ActionHandler, StepEffect};
use crate::scope::StepScope;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;
use trawl_browser::actions::resolve_url;
use trawl_recipe::{ConfigError, ScraperConfig, SelectorConfig, StepParams};

/// Which selectors an extract step reads and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// `extract { fields? }`: every listed (or declared) selector; misses are skipped
    Declared,
    /// `extract_single { field, required? }`: first match of one selector
    Single,
    /// `extract_multiple { field }`: every match of one selector
    Multiple,
}

pub struct Extract {
    mode: ExtractMode,
}

impl Extract {
    pub fn new(mode: ExtractMode) -> Self {
        Self { mode }
    }

    fn fields(&self, params: &StepParams, config: &ScraperConfig) -> Vec<String> {
        match self.mode {
            ExtractMode::Declared => string_list(params, "fields")
                .unwrap_or_else(|| config.selectors.iter().map(|s| s.name.clone()).collect()),
            ExtractMode::Single | ExtractMode::Multiple => {
                str_param(params, "field").map(|f| vec![f.to_string()]).unwrap_or_default()
            }
        }
    }
}

#[async_trait]
impl ActionHandler for Extract {
    fn name(&self) -> &'static str {
        match self.mode {
            ExtractMode::Declared => "extract",
            ExtractMode::Single => "extract_single",
            ExtractMode::Multiple => "extract_multiple",
        }
    }

    fn validate(&self, params: &StepParams) -> Result<(), String> {
        match self.mode {
            ExtractMode::Declared => match params.get("fields") {
                None | Some(Value::String(_)) => Ok(()),
                Some(Value::Array(items)) if items.iter().all(Value::is_string) => Ok(()),
                Some(_) => Err("'fields' must be a list of selector names".to_string()),
            },
            ExtractMode::Single | ExtractMode::Multiple => expect_str(params, "field"),
        }
    }

    fn check_recipe(
        &self,
        index: usize,
        params: &StepParams,
        config: &ScraperConfig,
    ) -> Result<(), ConfigError> {
        for name in self.fields(params, config) {
            if config.selector(&name).is_none() {
                return Err(ConfigError::UnknownSelector {
                    index,
                    action: self.name().to_string(),
                    name,
                });
            }
        }
        Ok(())
    }

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect> {
        let required = match self.mode {
            ExtractMode::Declared => false,
            ExtractMode::Single => params.get("required").and_then(Value::as_bool).unwrap_or(true),
            ExtractMode::Multiple => false,
        };

        for name in self.fields(params, scope.config) {
            let selector = scope
                .config
                .selector(&name)
                .cloned()
                .ok_or_else(|| StepError::InvalidParams(format!("unknown selector '{name}'")))?;
            let multiple = match self.mode {
                ExtractMode::Declared => selector.multiple,
                ExtractMode::Single => false,
                ExtractMode::Multiple => true,
            };

            match read_selector(scope, &selector, multiple).await? {
                Some(value) => scope.ctx.set(name, value),
                None if required => {
                    return Err(StepError::Selector(format!(
                        "{}: no element for '{name}'",
                        selector.selector
                    )))
                }
                None if multiple => scope.ctx.set(name, Value::Array(Vec::new())),
                None => debug!(field = %name, "selector matched nothing; field skipped"),
            }
        }
        Ok(StepEffect::Continue)
    }
}

/// Read a selector's attribute from the first fallback that matches.
async fn read_selector(
    scope: &mut StepScope<'_>,
    selector: &SelectorConfig,
    multiple: bool,
) -> StepResult<Option<Value>> {
    let candidates = selector.candidates();
    let found = scope.find_now(&candidates).await?;
    if found.is_empty() {
        return Ok(None);
    }

    let browser = scope.browser()?;
    let base = browser.current_url().await?;
    let is_link = matches!(selector.attribute.as_str(), "href" | "src");

    let mut values = Vec::new();
    for element in found {
        let Some(raw) = browser.read_attribute(element, &selector.attribute).await? else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let value = if is_link {
            resolve_url(base.as_deref(), raw)
        } else {
            raw.to_string()
        };
        if !multiple {
            return Ok(Some(Value::String(value)));
        }
        values.push(Value::String(value));
    }

    if values.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Value::Array(values)))
    }
}

/// `extract_from_json { field, path, selector? }`: read a value out of a
/// `<script>` JSON payload by dot path (`offers.0.price`).
pub struct ExtractFromJson;

const JSON_SCRIPTS: &str = "script[type='application/ld+json'], script[type='application/json']";

/// Follow a dot path; numeric segments index arrays.
fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

#[async_trait]
impl ActionHandler for ExtractFromJson {
    fn name(&self) -> &'static str {
        "extract_from_json"
    }

    fn validate(&self, params: &StepParams) -> Result<(), String> {
        expect_str(params, "field")?;
        expect_str(params, "path")
    }

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect> {
        let field = str_param(params, "field").unwrap_or_default().to_string();
        let path = str_param(params, "path").unwrap_or_default();
        let candidates = scope.candidates(str_param(params, "selector").unwrap_or(JSON_SCRIPTS));

        let scripts = scope.find_now(&candidates).await?;
        if scripts.is_empty() {
            return Err(StepError::Selector(format!(
                "no JSON script matched {}",
                candidates.join(", ")
            )));
        }

        let browser = scope.browser()?;
        let mut parse_errors = 0;
        let mut extracted = None;
        for script in scripts {
            let body = browser.read_attribute(script, "html").await?.unwrap_or_default();
            let payload: Value = match serde_json::from_str(body.trim()) {
                Ok(payload) => payload,
                Err(e) => {
                    debug!(error = %e, "skipping unparsable script payload");
                    parse_errors += 1;
                    continue;
                }
            };
            if let Some(found) = json_path(&payload, path) {
                extracted = Some(match found {
                    Value::Number(n) => Value::String(n.to_string()),
                    other => other.clone(),
                });
                break;
            }
        }

        let value = extracted.ok_or_else(|| {
            StepError::Payload(format!(
                "path '{path}' not found in any script payload ({parse_errors} unparsable)"
            ))
        })?;
        scope.ctx.set(field, value);
        Ok(StepEffect::Continue)
    }
}

static WEIGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(lbs?|pounds?|kgs?|kilograms?|oz|ounces?|g|grams?)\b")
        .expect("weight regex is valid")
});

const LB_PER_KG: f64 = 2.20462;
const LB_PER_OZ: f64 = 1.0 / 16.0;
const LB_PER_G: f64 = 1.0 / 453.592;

fn format_pounds(lb: f64) -> String {
    let thousandths = lb * 1000.0;
    let text = if (thousandths - thousandths.round()).abs() < 1e-6 {
        format!("{lb:.3}")
    } else {
        format!("{lb:.2}")
    };
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} lb")
}

/// Convert the first `<number><unit>` in `text` to pounds.
///
/// Values exact to three decimals keep them (`"10 oz"` → `"0.625 lb"`);
/// others are rounded to two (`"2 kg"` → `"4.41 lb"`). No match yields an
/// empty string.
pub fn parse_weight(text: &str) -> String {
    let Some(caps) = WEIGHT.captures(text) else {
        return String::new();
    };
    let Ok(amount) = caps[1].parse::<f64>() else {
        return String::new();
    };
    let unit = caps[2].to_lowercase();
    let factor = match unit.as_str() {
        "kg" | "kgs" | "kilogram" | "kilograms" => LB_PER_KG,
        "oz" | "ounce" | "ounces" => LB_PER_OZ,
        "g" | "gram" | "grams" => LB_PER_G,
        _ => 1.0,
    };
    format_pounds(amount * factor)
}

/// `parse_weight { field?, target? }`: normalize a weight field to pounds.
pub struct ParseWeight;

#[async_trait]
impl ActionHandler for ParseWeight {
    fn name(&self) -> &'static str {
        "parse_weight"
    }

    fn validate(&self, _params: &StepParams) -> Result<(), String> {
        Ok(())
    }

    fn touches_page(&self) -> bool {
        false
    }

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect> {
        let field = str_param(params, "field").unwrap_or("weight");
        let target = str_param(params, "target").unwrap_or(field);
        let raw = scope.ctx.text(field).unwrap_or_default();
        let parsed = parse_weight(&raw);
        if parsed.is_empty() && !raw.is_empty() {
            debug!(field, raw = %raw, "no weight found");
        }
        scope.ctx.set(target, parsed);
        Ok(StepEffect::Continue)
    }
}

/// Regex rewrite applied to every image URL.
#[derive(Debug, Clone, Deserialize)]
pub struct UpgradeRule {
    pub pattern: String,
    pub replacement: String,
}

static DEFAULT_UPGRADES: Lazy<Vec<(Regex, String)>> = Lazy::new(|| {
    [
        (r"(?i)_(thumb|small|medium)\.(jpe?g|png|webp)", "_large.$2"),
        (r"(?i)/(thumbs?|thumbnails?|small)/", "/large/"),
        (r"(?i)([?&])(w|width|h|height)=\d+", "${1}${2}=1500"),
    ]
    .into_iter()
    .map(|(p, r)| (Regex::new(p).expect("upgrade regex is valid"), r.to_string()))
    .collect()
});

/// Apply upgrade rules in order, keep URLs containing any `include` term
/// (when given), drop those containing any `exclude` term, then remove
/// duplicates keeping first occurrences. Terms match case-insensitively.
pub fn process_images(
    urls: Vec<String>,
    rules: &[(Regex, String)],
    include: &[String],
    exclude: &[String],
) -> Vec<String> {
    let include: Vec<String> = include.iter().map(|t| t.to_lowercase()).collect();
    let exclude: Vec<String> = exclude.iter().map(|t| t.to_lowercase()).collect();
    let mut seen = HashSet::new();

    urls.into_iter()
        .map(|url| {
            rules.iter().fold(url, |acc, (re, replacement)| {
                re.replace_all(&acc, replacement.as_str()).into_owned()
            })
        })
        .filter(|url| {
            let lower = url.to_lowercase();
            (include.is_empty() || include.iter().any(|t| lower.contains(t)))
                && !exclude.iter().any(|t| lower.contains(t))
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn parse_rules(params: &StepParams) -> Result<Option<Vec<(Regex, String)>>, String> {
    let Some(raw) = params.get("upgrade_rules") else {
        return Ok(None);
    };
    let rules: Vec<UpgradeRule> =
        serde_json::from_value(raw.clone()).map_err(|e| format!("'upgrade_rules': {e}"))?;
    rules
        .into_iter()
        .map(|rule| {
            Regex::new(&rule.pattern)
                .map(|re| (re, rule.replacement))
                .map_err(|e| format!("upgrade rule '{}': {e}", rule.pattern))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// `process_images { field?, upgrade_rules?, include?, exclude? }`
pub struct ProcessImages;

#[async_trait]
impl ActionHandler for ProcessImages {
    fn name(&self) -> &'static str {
        "process_images"
    }

    fn validate(&self, params: &StepParams) -> Result<(), String> {
        parse_rules(params).map(|_| ())
    }

    fn touches_page(&self) -> bool {
        false
    }

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect> {
        let field = str_param(params, "field").unwrap_or("image_urls");
        let urls: Vec<String> = match scope.ctx.results.get(field) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        };

        let custom = parse_rules(params).map_err(StepError::InvalidParams)?;
        let rules = custom.as_deref().unwrap_or(DEFAULT_UPGRADES.as_slice());
        let include = string_list(params, "include").unwrap_or_default();
        let exclude = string_list(params, "exclude").unwrap_or_default();

        let processed = process_images(urls, rules, &include, &exclude);
        scope.ctx.set(
            field,
            Value::Array(processed.into_iter().map(Value::String).collect()),
        );
        Ok(StepEffect::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_weight_conversions() {
        assert_eq!(parse_weight("10 oz"), "0.625 lb");
        assert_eq!(parse_weight("2 kg"), "4.41 lb");
        assert_eq!(parse_weight("Weight: 3.5 lbs"), "3.5 lb");
        assert_eq!(parse_weight("500g"), "1.1 lb");
        assert_eq!(parse_weight("no data"), "");
    }

    #[test]
    fn test_process_images_dedup_preserves_order() {
        let urls = vec!["A".to_string(), "B".to_string(), "A".to_string()];
        assert_eq!(process_images(urls, &[], &[], &[]), vec!["A", "B"]);
    }

    #[test]
    fn test_process_images_upgrades_then_filters() {
        let urls = vec![
            "https://cdn.test/p/drill_thumb.jpg".to_string(),
            "https://cdn.test/p/drill_large.jpg".to_string(),
            "https://cdn.test/badges/sale.png".to_string(),
            "https://cdn.test/thumbs/side.jpg".to_string(),
        ];
        let processed = process_images(urls, &DEFAULT_UPGRADES, &[], &["badges".to_string()]);
        assert_eq!(
            processed,
            vec![
                "https://cdn.test/p/drill_large.jpg",
                "https://cdn.test/large/side.jpg"
            ]
        );
    }

    #[test]
    fn test_process_images_include_filter() {
        let urls = vec!["https://cdn.test/a.JPG".to_string(), "https://cdn.test/a.gif".to_string()];
        let kept = process_images(urls, &[], &[".jpg".to_string()], &[]);
        assert_eq!(kept, vec!["https://cdn.test/a.JPG"]);
    }

    #[test]
    fn test_custom_rules_parse() {
        let params = match json!({"upgrade_rules": [{"pattern": "_s\\.", "replacement": "_xl."}]}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let rules = parse_rules(&params).unwrap().unwrap();
        let out = process_images(vec!["x_s.png".to_string()], &rules, &[], &[]);
        assert_eq!(out, vec!["x_xl.png"]);

        let bad = match json!({"upgrade_rules": [{"pattern": "(", "replacement": ""}]}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert!(ProcessImages.validate(&bad).is_err());
    }

    #[test]
    fn test_json_path() {
        let payload = json!({"offers": [{"price": 129.99}], "name": "Drill"});
        assert_eq!(json_path(&payload, "offers.0.price"), Some(&json!(129.99)));
        assert_eq!(json_path(&payload, "name"), Some(&json!("Drill")));
        assert_eq!(json_path(&payload, "offers.3.price"), None);
    }
}
