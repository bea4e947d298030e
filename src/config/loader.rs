//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles environment detection,
//! TOML layering and environment-variable overrides through the `config` crate.

use super::error::{ConfigResult, ConfigurationError};
use super::PipelineConfig;
use crate::constants::env_vars;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: PipelineConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Overrides are read from the process environment.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(config_dir, environment, None)
    }

    /// Like [`Self::load_from_directory_with_env`] but with overrides taken from
    /// `vars` instead of the process environment. Keys use the same
    /// `PIPELINE__SECTION__KEY` form.
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        vars: HashMap<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(config_dir, environment, Some(vars))
    }

    fn build(
        config_dir: Option<PathBuf>,
        environment: &str,
        vars: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);
        if !config_directory.is_dir() {
            return Err(ConfigurationError::DirectoryNotFound {
                path: config_directory,
            });
        }

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let base = config_directory.join("base.toml");
        let overlay = config_directory
            .join("environments")
            .join(format!("{environment}.toml"));

        let overrides = config::Environment::with_prefix(env_vars::CONFIG_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("languages.targets")
            .try_parsing(true)
            .source(vars);

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&PipelineConfig::default())?)
            .add_source(config::File::from(base.as_path()).required(false))
            .add_source(config::File::from(overlay.as_path()).required(false))
            .add_source(overrides)
            .build()?;

        let config: PipelineConfig = settings.try_deserialize()?;
        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );
        info!(
            environment = %environment,
            target_languages = config.languages.targets.len(),
            result_bucket = %config.storage.result_bucket,
            "Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Configuration with sensitive fields masked, for logs and CLI output
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment: PIPELINE_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var(env_vars::ENVIRONMENT)
            .or_else(|_| env::var(env_vars::APP_ENVIRONMENT))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        if let Ok(dir) = env::var(env_vars::CONFIG_DIR) {
            return PathBuf::from(dir);
        }
        PathBuf::from("config").join("pipeline")
    }

    fn sanitize_config_for_logging(config: &PipelineConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        let sensitive_patterns = ["password", "secret", "key", "token", "credential", "webhook"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if !is_sensitive {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                        continue;
                    }

                    *val = match val {
                        serde_json::Value::String(s) if s.is_empty() => {
                            serde_json::Value::String("[EMPTY]".to_string())
                        }
                        serde_json::Value::String(s) => {
                            // Keep the origin of URLs so misconfigured hosts are still visible
                            let visible = s.split('?').next().unwrap_or_default();
                            if visible.len() < s.len() {
                                serde_json::Value::String(format!("{visible}?[MASKED]"))
                            } else if s.chars().count() > 4 {
                                let head: String = s.chars().take(2).collect();
                                let mut tail: Vec<char> = s.chars().rev().take(2).collect();
                                tail.reverse();
                                serde_json::Value::String(format!(
                                    "[MASKED: {head}***{}]",
                                    tail.into_iter().collect::<String>()
                                ))
                            } else {
                                serde_json::Value::String("[MASKED]".to_string())
                            }
                        }
                        _ => serde_json::Value::String("[MASKED]".to_string()),
                    };
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }
}
