use std::path::PathBuf;
use trawl_recipe::{ConfigError, RecipeLoader, RecipeRegistry};

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[test]
fn test_fixture_recipe_loads() {
    let loader = RecipeLoader::new(fixtures()).unwrap();
    let recipe = loader.load("hardware-store").unwrap();

    assert_eq!(recipe.timeout, 20);
    assert_eq!(recipe.workflow.len(), 7);
    assert_eq!(
        recipe.selector("name").unwrap().candidates(),
        vec!["h1.product-title".to_string(), "h1".to_string()]
    );
    let login = recipe.login.as_ref().unwrap();
    assert_eq!(login.success_selector.as_deref(), Some(".account-menu"));
    assert_eq!(recipe.anti_detection.session_rotation_interval, 25);
    // Unset anti-detection fields keep their defaults
    assert_eq!(recipe.anti_detection.max_retries_on_detection, 3);
}

#[test]
fn test_registry_from_fixture_dir() {
    let loader = RecipeLoader::new(fixtures()).unwrap();
    let registry = RecipeRegistry::load_from(&loader).unwrap();
    assert!(registry.contains("hardware-store"));
    assert_eq!(registry.count(), 1);
}

#[test]
fn test_data_dir_loader_points_at_recipes() {
    match RecipeLoader::from_data_dir() {
        Ok(loader) => assert!(loader.dir().ends_with("recipes")),
        Err(ConfigError::DirectoryNotFound { path }) => assert!(path.ends_with("recipes")),
        Err(ConfigError::Settings(_)) => {}
        Err(other) => panic!("unexpected error {other:?}"),
    }
}
