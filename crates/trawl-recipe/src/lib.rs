//! Trawl Recipe - declarative scraping recipes.
//!
//! A recipe ([`ScraperConfig`]) describes how to look up keys on one site:
//! named selectors, an ordered workflow of actions, an optional login and
//! the anti-detection policy. Recipes are written in TOML or JSON, parsed
//! and validated up front, and cached in a [`RecipeRegistry`].
//!
//! # Example
//!
//! ```rust
//! use trawl_recipe::parse_config;
//!
//! let recipe = parse_config(r#"
//! name = "hardware-store"
//! base_url = "https://hardware.test"
//!
//! [[workflow]]
//! action = "navigate"
//! params = { url = "{base_url}/p/{sku}" }
//! "#).unwrap();
//!
//! assert_eq!(recipe.timeout, 30);
//! assert_eq!(recipe.workflow[0].action, "navigate");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod definition;
pub mod error;
pub mod loader;
pub mod parser;
pub mod registry;

pub use definition::{
    split_fallbacks, AntiDetectionConfig, LoginConfig, ScraperConfig, SelectorConfig, StepParams,
    ValidationConfig, WorkflowStep, DEFAULT_RETRIES, DEFAULT_TIMEOUT_SECS,
};
pub use error::{ConfigError, Result};
pub use loader::RecipeLoader;
pub use parser::{parse_as, parse_config, parse_json, parse_toml, SourceFormat};
pub use registry::RecipeRegistry;
