//! Error types for recipe parsing and loading.

use thiserror::Error;

/// Errors that make a recipe unusable.
///
/// A `ConfigError` is always fatal for the batch that uses the recipe: it is
/// raised before any browser work begins.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required top-level field is absent or empty
    #[error("missing required field: {field}")]
    MissingField {
        /// Field name
        field: &'static str,
    },

    /// A field holds a value outside its allowed range
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },

    /// A step's action is not a lowercase-underscore identifier
    #[error("step {index}: invalid action identifier '{action}'")]
    InvalidAction {
        /// Zero-based step position
        index: usize,
        /// Offending action string
        action: String,
    },

    /// A step names an action no handler is registered for
    #[error("step {index}: unknown action '{action}'")]
    UnknownAction {
        /// Zero-based step position
        index: usize,
        /// Unregistered action name
        action: String,
    },

    /// A step's parameters were rejected by its handler
    #[error("step {index} ({action}): invalid parameters: {reason}")]
    InvalidParams {
        /// Zero-based step position
        index: usize,
        /// Action name
        action: String,
        /// What is wrong with the parameters
        reason: String,
    },

    /// Two selectors share a name
    #[error("duplicate selector name: {name}")]
    DuplicateSelector {
        /// Repeated name
        name: String,
    },

    /// A step references a selector that is not declared
    #[error("step {index} ({action}): unknown selector '{name}'")]
    UnknownSelector {
        /// Zero-based step position
        index: usize,
        /// Action name
        action: String,
        /// Undeclared selector name
        name: String,
    },

    /// The `login` action was used without a `[login]` section
    #[error("step {index}: login action requires a [login] section")]
    MissingLogin {
        /// Zero-based step position
        index: usize,
    },

    /// TOML syntax or schema error
    #[error("failed to parse recipe TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax or schema error
    #[error("failed to parse recipe JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A recipe file could not be read or parsed
    #[error("recipe {path}: {source}")]
    InFile {
        /// Path to the recipe file
        path: String,
        /// Underlying error
        #[source]
        source: Box<ConfigError>,
    },

    /// Recipe directory not found
    #[error("recipe directory not found at {path}")]
    DirectoryNotFound {
        /// Expected directory path
        path: String,
    },

    /// The platform recipe directory could not be determined
    #[error("recipe directory unavailable: {0}")]
    Settings(#[from] trawl_core::ConfigFileError),

    /// No recipe registered under the requested name
    #[error("recipe not found: {name}")]
    NotFound {
        /// Requested recipe name
        name: String,
    },

    /// I/O error while accessing recipes
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for recipe operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
