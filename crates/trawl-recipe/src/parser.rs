//! Recipe parsing from TOML or JSON text.

use crate::definition::ScraperConfig;
use crate::error::Result;
use std::path::Path;

/// Text format of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// TOML document
    Toml,
    /// JSON object
    Json,
}

impl SourceFormat {
    /// Guess the format from the text: a leading `{` means JSON.
    #[must_use]
    pub fn detect(source: &str) -> Self {
        if source.trim_start().starts_with('{') {
            Self::Json
        } else {
            Self::Toml
        }
    }

    /// Format implied by a file extension, if recognised.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => Some(Self::Toml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse and validate a recipe, detecting its format.
pub fn parse_config(source: &str) -> Result<ScraperConfig> {
    parse_as(source, SourceFormat::detect(source))
}

/// Parse and validate a TOML recipe.
pub fn parse_toml(source: &str) -> Result<ScraperConfig> {
    parse_as(source, SourceFormat::Toml)
}

/// Parse and validate a JSON recipe.
pub fn parse_json(source: &str) -> Result<ScraperConfig> {
    parse_as(source, SourceFormat::Json)
}

/// Parse and validate a recipe in the given format.
pub fn parse_as(source: &str, format: SourceFormat) -> Result<ScraperConfig> {
    let config: ScraperConfig = match format {
        SourceFormat::Toml => toml::from_str(source)?,
        SourceFormat::Json => serde_json::from_str(source)?,
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    const TOML_RECIPE: &str = r#"
name = "hardware-store"
base_url = "https://hardware.test"
retries = 2

[[selectors]]
name = "name"
selector = "h1.product-title"

[[selectors]]
name = "image_urls"
selector = "img.gallery"
attribute = "src"
multiple = true

[[workflow]]
action = "navigate"
params = { url = "{base_url}/search?q={sku}" }

[[workflow]]
action = "check_no_results"

[[workflow]]
action = "extract"
params = { fields = ["name", "image_urls"] }

[anti_detection]
enable_human_simulation = false
rate_limit_min_delay = 0.5
rate_limit_max_delay = 1.5

[validation]
no_results_text_patterns = ["no products found"]
"#;

    #[test]
    fn test_parse_toml_recipe() {
        let config = parse_config(TOML_RECIPE).unwrap();
        assert_eq!(config.name, "hardware-store");
        assert_eq!(config.timeout, 30);
        assert_eq!(config.retries, 2);
        assert_eq!(config.workflow.len(), 3);
        assert!(config.workflow[1].params.is_empty());
        assert!(config.selector("image_urls").unwrap().multiple);
        assert_eq!(config.selector("name").unwrap().attribute, "text");
        assert!(!config.anti_detection.enable_human_simulation);
        assert!(config.anti_detection.enable_captcha_detection);
        assert_eq!(config.anti_detection.session_rotation_interval, 50);
    }

    #[test]
    fn test_parse_json_with_camel_case() {
        let json = r#"{
            "name": "garden",
            "baseUrl": "https://garden.test",
            "selectors": [{"name": "price", "selector": ".price"}],
            "workflow": [{"action": "navigate", "params": {"url": "{base_url}"}}],
            "antiDetection": {"enableRateLimiting": false, "sessionRotationInterval": 10},
            "validation": {"noResultsSelectors": [".empty"]}
        }"#;
        assert_eq!(SourceFormat::detect(json), SourceFormat::Json);

        let config = parse_config(json).unwrap();
        assert_eq!(config.base_url, "https://garden.test");
        assert!(!config.anti_detection.enable_rate_limiting);
        assert_eq!(config.anti_detection.session_rotation_interval, 10);
        assert_eq!(config.validation.no_results_selectors, vec![".empty"]);
    }

    #[test]
    fn test_missing_base_url_is_config_error() {
        let err = parse_toml("name = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "base_url" }));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            parse_toml("name = "),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            parse_json("{\"name\": "),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            SourceFormat::from_path(Path::new("a/b.json")),
            Some(SourceFormat::Json)
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("b.toml")),
            Some(SourceFormat::Toml)
        );
        assert_eq!(SourceFormat::from_path(Path::new("README.md")), None);
    }
}
