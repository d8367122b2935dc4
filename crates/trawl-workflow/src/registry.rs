//! Name → handler map for workflow actions.

use crate::actions;
use crate::error::StepResult;
use crate::scope::StepScope;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use trawl_recipe::{ConfigError, ScraperConfig, StepParams};

/// What the executor does after a step succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEffect {
    Continue,
    /// End this key's run as a skip, keeping fields extracted so far
    SkipRemaining { reason: String },
}

/// One workflow action.
///
/// Handlers receive parameters with placeholders already resolved.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Action name used in recipes
    fn name(&self) -> &'static str;

    /// Check parameters. `Err` carries the reason they are unusable.
    fn validate(&self, params: &StepParams) -> Result<(), String>;

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect>;

    /// Whether the step acts on the page and is wrapped in the
    /// anti-detection hooks
    fn touches_page(&self) -> bool {
        true
    }

    /// Whether the step issues a request counted toward session rotation
    fn counts_as_request(&self) -> bool {
        false
    }

    /// Recipe-level checks beyond parameter shape, such as references to
    /// declared selectors.
    fn check_recipe(
        &self,
        _index: usize,
        _params: &StepParams,
        _config: &ScraperConfig,
    ) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Registered action handlers.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in action.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for handler in actions::builtin() {
            registry.register(handler);
        }
        registry
    }

    /// Add a handler, replacing any handler with the same name.
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        debug!(action = handler.name(), "registered action");
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn get(&self, action: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(action).cloned()
    }

    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Sorted action names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check every step of `config` against the registered handlers.
    ///
    /// Parameters containing placeholders are validated in their template
    /// form, so only their shape is checked here.
    pub fn check_config(&self, config: &ScraperConfig) -> Result<(), ConfigError> {
        for (index, step) in config.workflow.iter().enumerate() {
            let handler = self
                .get(&step.action)
                .ok_or_else(|| ConfigError::UnknownAction {
                    index,
                    action: step.action.clone(),
                })?;
            handler
                .validate(&step.params)
                .map_err(|reason| ConfigError::InvalidParams {
                    index,
                    action: step.action.clone(),
                    reason,
                })?;
            handler.check_recipe(index, &step.params, config)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}
