//! In-memory recipe registry.

use crate::definition::ScraperConfig;
use crate::error::{ConfigError, Result};
use crate::loader::RecipeLoader;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Shared cache of validated recipes keyed by name.
///
/// Recipes are handed out as `Arc`s so concurrent site runs can share one
/// immutable config.
#[derive(Clone, Default)]
pub struct RecipeRegistry {
    recipes: Arc<RwLock<HashMap<String, Arc<ScraperConfig>>>>,
}

impl RecipeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding everything `loader` can load.
    pub fn load_from(loader: &RecipeLoader) -> Result<Self> {
        let registry = Self::new();
        registry.reload(loader)?;
        Ok(registry)
    }

    /// Replace the cache with a fresh load.
    pub fn reload(&self, loader: &RecipeLoader) -> Result<()> {
        let recipes = loader.load_all()?;
        let mut cache = self.recipes.write().expect("acquire write lock on recipes");
        cache.clear();
        for recipe in recipes {
            cache.insert(recipe.name.clone(), Arc::new(recipe));
        }
        info!(count = cache.len(), "reloaded recipes");
        Ok(())
    }

    /// Get a recipe by name.
    pub fn get(&self, name: &str) -> Result<Arc<ScraperConfig>> {
        let cache = self.recipes.read().expect("acquire read lock on recipes");
        cache.get(name).cloned().ok_or_else(|| ConfigError::NotFound {
            name: name.to_string(),
        })
    }

    /// Add or replace a recipe after validating it.
    pub fn insert(&self, recipe: ScraperConfig) -> Result<()> {
        recipe.validate()?;
        let mut cache = self.recipes.write().expect("acquire write lock on recipes");
        debug!(name = %recipe.name, "registered recipe");
        cache.insert(recipe.name.clone(), Arc::new(recipe));
        Ok(())
    }

    /// Sorted recipe names
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let cache = self.recipes.read().expect("acquire read lock on recipes");
        let mut names: Vec<_> = cache.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of recipes held
    #[must_use]
    pub fn count(&self) -> usize {
        self.recipes.read().expect("acquire read lock on recipes").len()
    }

    /// Whether a recipe named `name` is held
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.recipes
            .read()
            .expect("acquire read lock on recipes")
            .contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_toml;

    fn recipe(name: &str) -> ScraperConfig {
        parse_toml(&format!(
            "name = \"{name}\"\nbase_url = \"https://{name}.test\"\n"
        ))
        .unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let registry = RecipeRegistry::new();
        registry.insert(recipe("b-shop")).unwrap();
        registry.insert(recipe("a-shop")).unwrap();

        assert_eq!(registry.count(), 2);
        assert!(registry.contains("a-shop"));
        assert_eq!(registry.names(), vec!["a-shop", "b-shop"]);
        assert_eq!(registry.get("b-shop").unwrap().base_url, "https://b-shop.test");
        assert!(matches!(
            registry.get("c-shop"),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_insert_rejects_invalid() {
        let registry = RecipeRegistry::new();
        let mut bad = recipe("x");
        bad.base_url.clear();
        assert!(registry.insert(bad).is_err());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_clones_share_cache() {
        let registry = RecipeRegistry::new();
        let other = registry.clone();
        registry.insert(recipe("shared")).unwrap();
        assert!(other.contains("shared"));
    }
}
