//! Loads the shipped configuration files for every environment

use ocr_pipeline::config::{ConfigManager, PipelineConfig};
use std::collections::HashMap;
use std::path::PathBuf;

fn config_dir() -> Option<PathBuf> {
    Some(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/pipeline"))
}

fn load(environment: &str) -> PipelineConfig {
    ConfigManager::load_with_overrides(config_dir(), environment, HashMap::new())
        .unwrap_or_else(|e| panic!("{environment} configuration should load: {e}"))
        .config()
        .clone()
}

#[test]
fn test_base_configuration_matches_defaults() {
    // no environment file exists for this name, so only base.toml applies
    assert_eq!(load("staging"), PipelineConfig::default());
}

#[test]
fn test_every_shipped_environment_is_valid() {
    for environment in ["development", "test", "production"] {
        let config = load(environment);
        assert!(config.validate().is_ok(), "{environment}");
    }
}

#[test]
fn test_environment_files_override_base() {
    let test = load("test");
    assert_eq!(test.languages.targets, vec!["en", "fr"]);
    assert_eq!(test.persistence.read_delay_ms, 0);
    assert_eq!(test.host.max_delivery_attempts, 3);
    // untouched sections keep base values
    assert_eq!(test.storage, PipelineConfig::default().storage);

    let production = load("production");
    assert_eq!(production.retrieval.max_attempts, 8);
    assert_eq!(production.notifications.dedup_ttl_seconds, 86_400);
}

#[test]
fn test_variables_override_files() {
    let vars = HashMap::from([
        ("PIPELINE__LANGUAGES__TARGETS".to_string(), "ja,ko".to_string()),
        ("PIPELINE__STORAGE__RESULT_BUCKET".to_string(), "override-bucket".to_string()),
    ]);
    let manager = ConfigManager::load_with_overrides(config_dir(), "production", vars).unwrap();
    assert_eq!(manager.config().languages.targets, vec!["ja", "ko"]);
    assert_eq!(manager.config().storage.result_bucket, "override-bucket");
    assert_eq!(manager.environment(), "production");
}

#[test]
fn test_debug_config_masks_webhook() {
    let manager =
        ConfigManager::load_with_overrides(config_dir(), "development", HashMap::new()).unwrap();
    let rendered = manager.debug_config().to_string();
    assert!(!rendered.contains("ocr-call"));
}
