//! Recipe loading from a directory of TOML and JSON files.

use crate::definition::ScraperConfig;
use crate::error::{ConfigError, Result};
use crate::parser::{parse_as, SourceFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Loads recipes from a directory tree.
///
/// A recipe is found by file stem: `load("hardware-store")` looks for
/// `hardware-store.toml` or `hardware-store.json` anywhere under the root.
pub struct RecipeLoader {
    recipes_dir: PathBuf,
}

impl RecipeLoader {
    /// Create a loader rooted at `recipes_dir`.
    ///
    /// # Errors
    /// Returns [`ConfigError::DirectoryNotFound`] if the path is not a directory.
    pub fn new(recipes_dir: impl Into<PathBuf>) -> Result<Self> {
        let recipes_dir = recipes_dir.into();
        if !recipes_dir.is_dir() {
            return Err(ConfigError::DirectoryNotFound {
                path: recipes_dir.display().to_string(),
            });
        }
        Ok(Self { recipes_dir })
    }

    /// Create a loader rooted at the engine's data directory
    /// (`~/.local/share/trawl/recipes` or the platform equivalent).
    pub fn from_data_dir() -> Result<Self> {
        Self::new(trawl_core::AppConfig::recipes_dir()?)
    }

    /// Root directory of this loader
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.recipes_dir
    }

    /// Load a single recipe by file stem.
    pub fn load(&self, name: &str) -> Result<ScraperConfig> {
        let path = Self::find_recipe(&self.recipes_dir, name)?.ok_or_else(|| {
            ConfigError::NotFound {
                name: name.to_string(),
            }
        })?;
        let config = Self::load_from_path(&path)?;
        debug!(name = %config.name, path = %path.display(), "loaded recipe");
        Ok(config)
    }

    /// Load every recipe under the root.
    ///
    /// Files that fail to parse or validate are logged and skipped.
    pub fn load_all(&self) -> Result<Vec<ScraperConfig>> {
        let mut recipes = Vec::new();
        Self::walk(&self.recipes_dir, &mut recipes)?;
        info!(
            count = recipes.len(),
            dir = %self.recipes_dir.display(),
            "loaded recipes"
        );
        Ok(recipes)
    }

    /// Read, parse and validate one recipe file.
    pub fn load_from_path(path: &Path) -> Result<ScraperConfig> {
        let wrap = |source: ConfigError| ConfigError::InFile {
            path: path.display().to_string(),
            source: Box::new(source),
        };
        let contents = std::fs::read_to_string(path).map_err(|e| wrap(e.into()))?;
        let format = SourceFormat::from_path(path).unwrap_or_else(|| SourceFormat::detect(&contents));
        parse_as(&contents, format).map_err(wrap)
    }

    fn walk(dir: &Path, recipes: &mut Vec<ScraperConfig>) -> Result<()> {
        let mut entries = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for path in entries {
            if path.is_dir() {
                Self::walk(&path, recipes)?;
                continue;
            }
            if SourceFormat::from_path(&path).is_none() {
                continue;
            }
            match Self::load_from_path(&path) {
                Ok(config) => recipes.push(config),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping invalid recipe"),
            }
        }
        Ok(())
    }

    fn find_recipe(dir: &Path, name: &str) -> Result<Option<PathBuf>> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                if let Some(found) = Self::find_recipe(&path, name)? {
                    return Ok(Some(found));
                }
            } else if SourceFormat::from_path(&path).is_some()
                && path.file_stem().and_then(|s| s.to_str()) == Some(name)
            {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}
