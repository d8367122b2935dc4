//! Shared types used across the trawl engine.

use crate::error::CoreError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// The output map for one lookup key: field name to extracted value.
///
/// Values are JSON so that multi-valued fields (image lists, raw arrays)
/// and scalar text share one representation.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Newtype for run identifiers with validation.
///
/// Run IDs are UUID v4 strings, generated locally or assigned by a remote
/// job platform (in which case any non-empty token is accepted via
/// [`RunId::remote`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Create a new `RunId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not a valid UUID v4.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Wrap an identifier assigned by a remote platform.
    ///
    /// # Errors
    /// Returns error if the ID is empty or contains whitespace.
    pub fn remote(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(CoreError::Validation(format!(
                "invalid remote run ID: '{id}'"
            )));
        }
        Ok(Self(id))
    }

    /// Create a new random `RunId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), CoreError> {
        static UUID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = UUID_REGEX.get_or_init(|| {
            Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
                .expect("valid regex")
        });

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "invalid run ID: must be a valid UUID v4, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal status of one lookup key within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    /// Every step ran to completion
    Succeeded,
    /// A `conditional_skip` step ended processing early
    Skipped,
    /// A step failed after retries and recovery
    Failed,
    /// The run was cancelled before the key finished
    Cancelled,
}

impl KeyStatus {
    /// Whether the key produced a usable (possibly partial) record.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped)
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Succeeded => "succeeded",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_generate_is_valid() {
        let id = RunId::generate();
        assert!(RunId::new(id.as_str()).is_ok());
    }

    #[test]
    fn test_run_id_rejects_garbage() {
        assert!(RunId::new("not-a-uuid").is_err());
        assert!(RunId::new("").is_err());
    }

    #[test]
    fn test_remote_run_id() {
        assert!(RunId::remote("HG7ML7M8z78YcAPEB").is_ok());
        assert!(RunId::remote("").is_err());
        assert!(RunId::remote("has space").is_err());
    }

    #[test]
    fn test_key_status() {
        assert!(KeyStatus::Skipped.is_success());
        assert!(!KeyStatus::Cancelled.is_success());
        assert_eq!(KeyStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_run_id_display() {
        let id = RunId::remote("abc123").expect("valid remote id");
        assert_eq!(id.to_string(), "abc123");
    }
}
