//! Recipe types.
//!
//! A [`ScraperConfig`] is the complete, declarative description of how to
//! look up keys on one site: where to start, which selectors name the data,
//! the ordered workflow, credentials handling and anti-detection policy.

use crate::error::{ConfigError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Default per-operation timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default retry count for selector and timeout failures.
pub const DEFAULT_RETRIES: u32 = 3;

static ACTION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("action regex is hardcoded and valid"));

/// Step parameters: free-form JSON values keyed by name.
pub type StepParams = serde_json::Map<String, serde_json::Value>;

/// Complete scraping recipe for one site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Recipe name, unique within a registry
    #[serde(default)]
    pub name: String,

    /// Site root; available to templates as `{base_url}`
    #[serde(default, alias = "baseUrl")]
    pub base_url: String,

    /// Bound for waits and navigation, in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Retries for selector and timeout failures per step
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Named selectors referenced by extraction steps
    #[serde(default)]
    pub selectors: Vec<SelectorConfig>,

    /// Ordered workflow steps
    #[serde(default)]
    pub workflow: Vec<WorkflowStep>,

    /// Optional login recipe driven by the `login` action
    #[serde(default)]
    pub login: Option<LoginConfig>,

    /// Anti-detection policy
    #[serde(default, alias = "antiDetection")]
    pub anti_detection: AntiDetectionConfig,

    /// No-results detection and output contract overrides
    #[serde(default)]
    pub validation: ValidationConfig,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

impl ScraperConfig {
    /// Per-operation timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Look up a selector by name.
    #[must_use]
    pub fn selector(&self, name: &str) -> Option<&SelectorConfig> {
        self.selectors.iter().find(|s| s.name == name)
    }

    /// Validate the recipe for completeness and correctness.
    ///
    /// Action identifiers are checked for shape only; whether a handler is
    /// registered for them is decided by the workflow engine.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "name" });
        }

        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "base_url" });
        }

        if self.timeout == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for selector in &self.selectors {
            selector.validate()?;
            if !seen.insert(selector.name.as_str()) {
                return Err(ConfigError::DuplicateSelector {
                    name: selector.name.clone(),
                });
            }
        }

        for (index, step) in self.workflow.iter().enumerate() {
            if !ACTION_NAME.is_match(&step.action) {
                return Err(ConfigError::InvalidAction {
                    index,
                    action: step.action.clone(),
                });
            }
        }

        if let Some(login) = &self.login {
            login.validate()?;
        }

        self.anti_detection.validate()?;

        Ok(())
    }
}

/// A named way to locate page data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Name used by steps and as the output field
    pub name: String,

    /// CSS or XPath expression; top-level commas separate fallbacks
    pub selector: String,

    /// What to read: `text`, `html`, `value`, or any attribute name
    #[serde(default = "default_attribute")]
    pub attribute: String,

    /// Collect every match instead of the first
    #[serde(default)]
    pub multiple: bool,
}

fn default_attribute() -> String {
    "text".to_string()
}

impl SelectorConfig {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "selectors.name".to_string(),
                reason: "selector name cannot be empty".to_string(),
            });
        }
        if self.candidates().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("selectors.{}.selector", self.name),
                reason: "selector expression cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Fallback candidates in priority order.
    ///
    /// Splits on commas that are not inside brackets, parentheses or quotes,
    /// so `a[title="x,y"], .b` yields two candidates.
    #[must_use]
    pub fn candidates(&self) -> Vec<String> {
        split_fallbacks(&self.selector)
    }
}

/// Split a selector list on top-level commas.
#[must_use]
pub fn split_fallbacks(selector: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in selector.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(ch);
                current.push(ch);
            }
            (None, '[' | '(') => {
                depth += 1;
                current.push(ch);
            }
            (None, ']' | ')') => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            (None, ',') if depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            (None, c) => current.push(c),
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// One declarative instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Action name (key into the action registry)
    pub action: String,

    /// Action parameters; string values may contain `{placeholder}` tokens
    #[serde(default)]
    pub params: StepParams,
}

impl WorkflowStep {
    /// Build a step from an action name and JSON object parameters.
    ///
    /// Non-object `params` are treated as empty.
    #[must_use]
    pub fn new(action: impl Into<String>, params: serde_json::Value) -> Self {
        let params = match params {
            serde_json::Value::Object(map) => map,
            _ => StepParams::new(),
        };
        Self {
            action: action.into(),
            params,
        }
    }
}

/// Login recipe for sites that require an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Login page URL (templated)
    pub url: String,

    /// Username input
    #[serde(alias = "username_field", alias = "usernameField")]
    pub username_selector: String,

    /// Password input
    #[serde(alias = "password_field", alias = "passwordField")]
    pub password_selector: String,

    /// Submit button
    #[serde(alias = "submit_button", alias = "submitButton")]
    pub submit_selector: String,

    /// Element that appears once logged in
    #[serde(default, alias = "success_indicator", alias = "successIndicator")]
    pub success_selector: Option<String>,

    /// Bound for the success wait in seconds; the recipe timeout when absent
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl LoginConfig {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("login.url", &self.url),
            ("login.username_selector", &self.username_selector),
            ("login.password_selector", &self.password_selector),
            ("login.submit_selector", &self.submit_selector),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Anti-detection policy. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct AntiDetectionConfig {
    /// Scan for CAPTCHA indicators after page actions
    #[serde(alias = "enableCaptchaDetection")]
    pub enable_captcha_detection: bool,
    /// Wait a randomized, failure-scaled delay before page actions
    #[serde(alias = "enableRateLimiting")]
    pub enable_rate_limiting: bool,
    /// Add human-like pauses around page actions
    #[serde(alias = "enableHumanSimulation")]
    pub enable_human_simulation: bool,
    /// Replace the browser after enough requests or time
    #[serde(alias = "enableSessionRotation")]
    pub enable_session_rotation: bool,
    /// Scan for blocking pages and run the recovery ladder
    #[serde(alias = "enableBlockingHandling")]
    pub enable_blocking_handling: bool,

    /// Selectors whose presence indicates a CAPTCHA
    #[serde(alias = "captchaSelectors")]
    pub captcha_selectors: Vec<String>,
    /// Selectors whose presence indicates a blocking page
    #[serde(alias = "blockingSelectors")]
    pub blocking_selectors: Vec<String>,
    /// Case-insensitive phrases in title or text indicating a blocking page
    #[serde(alias = "blockingTextPatterns")]
    pub blocking_text_patterns: Vec<String>,

    /// Lower bound of the base rate-limit delay
    #[serde(alias = "rateLimitMinDelay")]
    pub rate_limit_min_delay: f64,
    /// Upper bound of the base rate-limit delay
    #[serde(alias = "rateLimitMaxDelay")]
    pub rate_limit_max_delay: f64,
    /// Cap on the failure-scaled delay
    #[serde(alias = "maxBackoff")]
    pub max_backoff: f64,

    /// Requests served by one browser before it is rotated
    #[serde(alias = "sessionRotationInterval")]
    pub session_rotation_interval: u32,
    /// Session age that forces a rotation
    #[serde(alias = "maxSessionAge")]
    pub max_session_age: f64,

    /// CAPTCHA re-checks before giving up
    #[serde(alias = "maxRetriesOnDetection")]
    pub max_retries_on_detection: u32,
    /// Pause between CAPTCHA re-checks
    #[serde(alias = "detectionWait")]
    pub detection_wait: f64,
    /// Extended wait on the first rung of the blocking recovery ladder
    #[serde(alias = "blockingWait")]
    pub blocking_wait: f64,
}

impl Default for AntiDetectionConfig {
    fn default() -> Self {
        Self {
            enable_captcha_detection: true,
            enable_rate_limiting: true,
            enable_human_simulation: true,
            enable_session_rotation: true,
            enable_blocking_handling: true,
            captcha_selectors: vec![
                "iframe[src*='recaptcha']".to_string(),
                ".g-recaptcha".to_string(),
                "iframe[src*='hcaptcha']".to_string(),
                ".h-captcha".to_string(),
                "#captcha".to_string(),
            ],
            blocking_selectors: vec![
                "#challenge-form".to_string(),
                ".cf-error-details".to_string(),
            ],
            blocking_text_patterns: vec![
                "access denied".to_string(),
                "you have been blocked".to_string(),
                "too many requests".to_string(),
                "unusual traffic".to_string(),
                "request blocked".to_string(),
            ],
            rate_limit_min_delay: 1.0,
            rate_limit_max_delay: 5.0,
            max_backoff: 60.0,
            session_rotation_interval: 50,
            max_session_age: 1800.0,
            max_retries_on_detection: 3,
            detection_wait: 5.0,
            blocking_wait: 30.0,
        }
    }
}

impl AntiDetectionConfig {
    /// Everything switched off; useful for trusted or local targets.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enable_captcha_detection: false,
            enable_rate_limiting: false,
            enable_human_simulation: false,
            enable_session_rotation: false,
            enable_blocking_handling: false,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        let durations = [
            ("anti_detection.rate_limit_min_delay", self.rate_limit_min_delay),
            ("anti_detection.rate_limit_max_delay", self.rate_limit_max_delay),
            ("anti_detection.max_backoff", self.max_backoff),
            ("anti_detection.max_session_age", self.max_session_age),
            ("anti_detection.detection_wait", self.detection_wait),
            ("anti_detection.blocking_wait", self.blocking_wait),
        ];
        for (field, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("must be a non-negative number of seconds, got {value}"),
                });
            }
        }

        if self.rate_limit_min_delay > self.rate_limit_max_delay {
            return Err(ConfigError::InvalidValue {
                field: "anti_detection.rate_limit_min_delay".to_string(),
                reason: format!(
                    "must not exceed rate_limit_max_delay ({} > {})",
                    self.rate_limit_min_delay, self.rate_limit_max_delay
                ),
            });
        }

        if self.session_rotation_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "anti_detection.session_rotation_interval".to_string(),
                reason: "must be at least 1 request".to_string(),
            });
        }

        Ok(())
    }
}

/// No-results detection and output contract overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Selectors whose presence means the site found nothing
    #[serde(alias = "noResultsSelectors")]
    pub no_results_selectors: Vec<String>,
    /// Case-insensitive phrases meaning the site found nothing
    #[serde(alias = "noResultsTextPatterns")]
    pub no_results_text_patterns: Vec<String>,
    /// Fields every record must carry; the product contract when empty
    #[serde(alias = "requiredFields")]
    pub required_fields: Vec<String>,
    /// Fields counted when present
    #[serde(alias = "optionalFields")]
    pub optional_fields: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> ScraperConfig {
        ScraperConfig {
            name: "shop".to_string(),
            base_url: "https://shop.test".to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
            selectors: vec![SelectorConfig {
                name: "price".to_string(),
                selector: ".price".to_string(),
                attribute: "text".to_string(),
                multiple: false,
            }],
            workflow: vec![WorkflowStep::new("navigate", json!({"url": "{base_url}"}))],
            login: None,
            anti_detection: AntiDetectionConfig::default(),
            validation: ValidationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn test_missing_name_and_base_url() {
        let mut config = minimal();
        config.name = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { field: "name" })
        ));

        let mut config = minimal();
        config.base_url = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { field: "base_url" })
        ));
    }

    #[test]
    fn test_duplicate_selector_rejected() {
        let mut config = minimal();
        config.selectors.push(config.selectors[0].clone());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateSelector { .. })
        ));
    }

    #[test]
    fn test_action_identifier_shape() {
        let mut config = minimal();
        config.workflow.push(WorkflowStep::new("Wait-For", json!({})));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAction { index: 1, .. })
        ));

        // Unregistered but well-formed names are accepted here
        let mut config = minimal();
        config.workflow.push(WorkflowStep::new("custom_action", json!({})));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rate_limit_bounds_validated() {
        let mut config = minimal();
        config.anti_detection.rate_limit_min_delay = 6.0;
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.anti_detection.detection_wait = -1.0;
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.anti_detection.session_rotation_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_split_fallbacks() {
        assert_eq!(
            split_fallbacks(".price, span[data-x='a,b'] , :is(.a, .b)"),
            vec![
                ".price".to_string(),
                "span[data-x='a,b']".to_string(),
                ":is(.a, .b)".to_string()
            ]
        );
        assert!(split_fallbacks(" , ").is_empty());
    }

    #[test]
    fn test_selector_lookup() {
        let config = minimal();
        assert!(config.selector("price").is_some());
        assert!(config.selector("weight").is_none());
    }
}
