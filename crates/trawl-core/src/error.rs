//! Core error types for the trawl engine.
//!
//! Subsystem crates define their own error enums; this module only covers
//! what the core owns: engine configuration files and shared type validation.

use thiserror::Error;

/// Errors raised by shared core types.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Engine configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigFileError),

    /// Validation errors (invalid identifiers, constraints)
    #[error("validation error: {0}")]
    Validation(String),

    /// Logging could not be initialized
    #[error("logging error: {0}")]
    Logging(String),
}

/// Engine configuration file errors.
#[derive(Error, Debug)]
pub enum ConfigFileError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Result type alias for engine configuration operations.
pub type ConfigFileResult<T> = std::result::Result<T, ConfigFileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::Validation("bad run id".to_string());
        assert_eq!(err.to_string(), "validation error: bad run id");

        let err = ConfigFileError::NoConfigDir;
        assert_eq!(
            err.to_string(),
            "could not determine config directory (XDG base directories not available)"
        );
    }

    #[test]
    fn test_error_from_config() {
        let core_err: CoreError = ConfigFileError::NoConfigDir.into();
        assert!(matches!(core_err, CoreError::Config(_)));
    }
}
