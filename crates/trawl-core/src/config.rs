//! Engine configuration for trawl.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Site recipes are not configured here;
//! see the `trawl-recipe` crate.

use crate::error::{ConfigFileError, ConfigFileResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main engine configuration.
///
/// This is loaded from `~/.config/trawl/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Browser launch settings
    pub browser: BrowserSettings,
    /// Batch execution settings
    pub execution: ExecutionSettings,
    /// Remote job platform settings
    pub platform: PlatformSettings,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigFileResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(path: &Path) -> ConfigFileResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `TRAWL_HEADLESS`: Override browser headless mode (true/false)
    /// - `TRAWL_MAX_CONCURRENT_SITES`: Override parallel site limit
    /// - `TRAWL_PLATFORM_TOKEN`: Remote platform API token
    /// - `TRAWL_LOG`: Override the default log filter
    pub fn load_with_env() -> ConfigFileResult<Self> {
        let mut config = Self::load()?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("TRAWL_HEADLESS") {
            match val.parse() {
                Ok(headless) => {
                    self.browser.headless = headless;
                    tracing::debug!("Override browser.headless from env: {}", headless);
                }
                Err(_) => tracing::warn!(value = %val, "ignoring invalid TRAWL_HEADLESS"),
            }
        }

        if let Some(val) = lookup("TRAWL_MAX_CONCURRENT_SITES") {
            match val.parse::<usize>() {
                Ok(max) if max > 0 => {
                    self.execution.max_concurrent_sites = max;
                    tracing::debug!("Override execution.max_concurrent_sites from env: {}", max);
                }
                _ => tracing::warn!(value = %val, "ignoring invalid TRAWL_MAX_CONCURRENT_SITES"),
            }
        }

        if let Some(token) = lookup("TRAWL_PLATFORM_TOKEN") {
            if !token.is_empty() {
                self.platform.token = Some(token);
            }
        }

        if let Some(filter) = lookup("TRAWL_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigFileResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> ConfigFileResult<()> {
        let config_dir = path.parent().ok_or_else(|| ConfigFileError::InvalidValue {
            field: "config_path".to_string(),
            reason: "no parent directory".to_string(),
        })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/trawl/config.toml`
    pub fn config_path() -> ConfigFileResult<PathBuf> {
        let dirs = ProjectDirs::from("rs", "trawl", "trawl").ok_or(ConfigFileError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the recipe directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/trawl/recipes`
    pub fn recipes_dir() -> ConfigFileResult<PathBuf> {
        let dirs = ProjectDirs::from("rs", "trawl", "trawl").ok_or(ConfigFileError::NoConfigDir)?;
        Ok(dirs.data_dir().join("recipes"))
    }
}

/// Browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run browser in headless mode
    pub headless: bool,
    /// Override the randomized viewport width
    pub window_width: Option<u32>,
    /// Override the randomized viewport height
    pub window_height: Option<u32>,
    /// Explicit Chrome/Chromium executable, otherwise auto-detected
    pub executable: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: None,
            window_height: None,
            executable: None,
        }
    }
}

/// Batch execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Independent site configs allowed to run in parallel
    pub max_concurrent_sites: usize,
    /// Event buffer per subscriber
    pub event_buffer: usize,
    /// Minimum quality score for a record to be considered acceptable
    pub quality_threshold: f64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            max_concurrent_sites: 3,
            event_buffer: 256,
            quality_threshold: 70.0,
        }
    }
}

/// Remote job platform settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    /// REST API base URL
    pub base_url: String,
    /// Actor that runs the trawl engine remotely
    pub actor_id: String,
    /// API token (prefer `TRAWL_PLATFORM_TOKEN` over writing it to disk)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Default wait for a remote run, in seconds
    pub run_timeout_secs: u64,
}

impl PlatformSettings {
    /// [`PlatformSettings::run_timeout_secs`] as a duration.
    #[must_use]
    pub fn run_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.run_timeout_secs)
    }
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.apify.com/v2".to_string(),
            actor_id: String::new(),
            token: None,
            run_timeout_secs: 1800,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,trawl=debug".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.browser.headless);
        assert_eq!(config.execution.max_concurrent_sites, 3);
        assert!(config.platform.token.is_none());
        assert_eq!(config.logging.filter, "info,trawl=debug");
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.browser.headless = false;
        config.execution.max_concurrent_sites = 8;
        config.save_to(&config_path).expect("save config");

        let loaded = AppConfig::load_from(&config_path).expect("load config");
        assert!(!loaded.browser.headless);
        assert_eq!(loaded.execution.max_concurrent_sites, 8);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let loaded = AppConfig::load_from(&tmp.path().join("absent.toml")).expect("load");
        assert!(loaded.browser.headless);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TRAWL_HEADLESS", "false"),
            ("TRAWL_MAX_CONCURRENT_SITES", "6"),
            ("TRAWL_PLATFORM_TOKEN", "apify_api_secret"),
            ("TRAWL_LOG", "warn"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| (*v).to_string()));

        assert!(!config.browser.headless);
        assert_eq!(config.execution.max_concurrent_sites, 6);
        assert_eq!(config.platform.token.as_deref(), Some("apify_api_secret"));
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn test_invalid_env_overrides_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(|name| match name {
            "TRAWL_HEADLESS" => Some("maybe".to_string()),
            "TRAWL_MAX_CONCURRENT_SITES" => Some("0".to_string()),
            _ => None,
        });
        assert!(config.browser.headless);
        assert_eq!(config.execution.max_concurrent_sites, 3);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[browser]
headless = false

[platform]
actor_id = "trawl~engine"
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert!(!config.browser.headless);
        assert_eq!(config.platform.actor_id, "trawl~engine");
        // These should be defaults
        assert_eq!(config.execution.max_concurrent_sites, 3);
        assert_eq!(config.platform.run_timeout_secs, 1800);
        assert_eq!(config.platform.run_timeout().as_secs(), 1800);
    }
}
