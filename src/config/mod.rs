//! # Pipeline Configuration
//!
//! Layered configuration for the pipeline: built-in defaults, then
//! `config/pipeline/base.toml`, then `config/pipeline/environments/{env}.toml`,
//! then `PIPELINE__SECTION__KEY` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ocr_pipeline::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let targets = &manager.config().languages.targets;
//! let delay = manager.config().persistence.read_delay();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants::{defaults, topics};

/// Root configuration structure mirroring `config/pipeline/base.toml`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub topics: TopicsConfig,
    pub languages: LanguagesConfig,
    pub storage: StorageConfig,
    pub persistence: PersistenceConfig,
    pub retrieval: RetrievalConfig,
    pub notifications: NotificationsConfig,
    pub host: HostConfig,
}

/// Logical topic names
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TopicsConfig {
    /// Upload notifications that trigger extraction
    pub uploads: String,
    pub translate: String,
    pub result: String,
    pub read: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LanguagesConfig {
    /// Every upload fans out to exactly one message per entry
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageConfig {
    pub result_bucket: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PersistenceConfig {
    /// Delay between a durable write and the visibility of its read request
    pub read_delay_ms: u64,
}

impl PersistenceConfig {
    pub fn read_delay(&self) -> Duration {
        Duration::from_millis(self.read_delay_ms)
    }
}

/// Retry policy for reading an artifact that is not visible yet
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetrievalConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NotificationsConfig {
    pub enabled: bool,
    /// URL the voice provider fetches call instructions from
    pub call_webhook_url: String,
    /// SMS body used when the artifact is empty
    pub empty_body_placeholder: String,
    /// How long a delivered notification suppresses duplicates
    pub dedup_ttl_seconds: u64,
}

impl NotificationsConfig {
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_seconds)
    }
}

/// Settings for the host that feeds deliveries to stages
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostConfig {
    /// Deadline for a single stage invocation
    pub stage_timeout_ms: u64,
    /// Deliveries beyond this count are dead-lettered
    pub max_delivery_attempts: u32,
    pub batch_size: usize,
    pub poll_interval_ms: u64,
    pub visibility_timeout_ms: u64,
}

impl HostConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_millis(self.visibility_timeout_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topics: TopicsConfig {
                uploads: topics::UPLOADS.to_string(),
                translate: topics::TRANSLATE.to_string(),
                result: topics::RESULT.to_string(),
                read: topics::READ.to_string(),
            },
            languages: LanguagesConfig {
                targets: defaults::TARGET_LANGUAGES
                    .iter()
                    .map(|lang| lang.to_string())
                    .collect(),
            },
            storage: StorageConfig {
                result_bucket: defaults::RESULT_BUCKET.to_string(),
            },
            persistence: PersistenceConfig {
                read_delay_ms: defaults::READ_DELAY_MS,
            },
            retrieval: RetrievalConfig {
                max_attempts: 5,
                initial_backoff_ms: 250,
                backoff_multiplier: 2.0,
                max_backoff_ms: 4_000,
            },
            notifications: NotificationsConfig {
                enabled: true,
                call_webhook_url: defaults::CALL_WEBHOOK_URL.to_string(),
                empty_body_placeholder: defaults::EMPTY_BODY_PLACEHOLDER.to_string(),
                dedup_ttl_seconds: 3_600,
            },
            host: HostConfig {
                stage_timeout_ms: 60_000,
                max_delivery_attempts: 5,
                batch_size: 10,
                poll_interval_ms: 100,
                visibility_timeout_ms: 90_000,
            },
        }
    }
}

impl PipelineConfig {
    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        self.validate_topics()?;
        self.validate_languages()?;

        if self.storage.result_bucket.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "result_bucket",
                "storage",
            ));
        }

        let retrieval = &self.retrieval;
        if retrieval.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "retrieval.max_attempts",
                "0",
                "at least one read attempt is required",
            ));
        }
        if !(retrieval.backoff_multiplier >= 1.0) {
            return Err(ConfigurationError::invalid_value(
                "retrieval.backoff_multiplier",
                retrieval.backoff_multiplier.to_string(),
                "must be >= 1.0",
            ));
        }
        if retrieval.max_backoff_ms < retrieval.initial_backoff_ms {
            return Err(ConfigurationError::invalid_value(
                "retrieval.max_backoff_ms",
                retrieval.max_backoff_ms.to_string(),
                "must not be lower than retrieval.initial_backoff_ms",
            ));
        }

        if self.notifications.enabled && self.notifications.call_webhook_url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "call_webhook_url",
                "notifications",
            ));
        }

        let host = &self.host;
        for (field, value) in [
            ("host.stage_timeout_ms", host.stage_timeout_ms),
            ("host.visibility_timeout_ms", host.visibility_timeout_ms),
            ("host.max_delivery_attempts", u64::from(host.max_delivery_attempts)),
            ("host.batch_size", host.batch_size as u64),
        ] {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(field, "0", "must be positive"));
            }
        }
        if host.visibility_timeout_ms < host.stage_timeout_ms {
            return Err(ConfigurationError::invalid_value(
                "host.visibility_timeout_ms",
                host.visibility_timeout_ms.to_string(),
                "must cover host.stage_timeout_ms or deliveries reappear mid-invocation",
            ));
        }

        Ok(())
    }

    fn validate_topics(&self) -> ConfigResult<()> {
        let names = [
            ("topics.uploads", &self.topics.uploads),
            ("topics.translate", &self.topics.translate),
            ("topics.result", &self.topics.result),
            ("topics.read", &self.topics.read),
        ];

        let mut seen = HashSet::new();
        for (field, name) in names {
            if name.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(field, "topics"));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigurationError::invalid_value(
                    field,
                    name.as_str(),
                    "topic names must be distinct",
                ));
            }
        }
        Ok(())
    }

    fn validate_languages(&self) -> ConfigResult<()> {
        let targets = &self.languages.targets;
        if targets.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "targets",
                "languages",
            ));
        }

        let mut seen = HashSet::new();
        for lang in targets {
            if lang.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "languages.targets",
                    lang.as_str(),
                    "language codes must be non-empty",
                ));
            }
            if !seen.insert(lang.as_str()) {
                return Err(ConfigurationError::invalid_value(
                    "languages.targets",
                    lang.as_str(),
                    "duplicate target language",
                ));
            }
        }
        Ok(())
    }
}
