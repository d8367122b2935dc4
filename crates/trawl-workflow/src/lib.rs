//! Workflow execution for trawl recipes.
//!
//! An [`ActionRegistry`] maps action names to [`ActionHandler`]s. A
//! [`WorkflowExecutor`] runs a recipe's steps for one key at a time inside a
//! single browser session, wrapping page actions in the anti-detection
//! hooks. A [`BatchRunner`] drives a list of keys through one recipe, and
//! [`run_sites`] runs several sites side by side.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trawl_browser::{ChromiumFactory, LaunchOptions};
//! use trawl_recipe::RecipeLoader;
//! use trawl_workflow::{ActionRegistry, BatchRunner};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let recipe = RecipeLoader::new("recipes")?.load("hardware-store")?;
//! let runner = BatchRunner::new(
//!     Arc::new(recipe),
//!     Arc::new(ActionRegistry::with_defaults()),
//!     Arc::new(ChromiumFactory::new(LaunchOptions::default())),
//! )
//! .with_recipe_quality();
//!
//! for result in runner.run(&["035585499741".to_string()]).await? {
//!     println!("{} {}", result.key, result.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod batch;
pub mod context;
pub mod error;
pub mod executor;
mod params;
pub mod registry;
pub mod scope;
pub mod template;

pub use batch::{run_sites, run_sites_with_settings, BatchRunner, KeyResult, SiteJob, SiteResult};
pub use context::{ContextFlag, ExecutionContext};
pub use error::{Result, StepError, StepResult, WorkflowError};
pub use executor::WorkflowExecutor;
pub use registry::{ActionHandler, ActionRegistry, StepEffect};
pub use scope::StepScope;
