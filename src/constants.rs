//! # System Constants
//!
//! Default topic names, configuration defaults and environment variable names.

/// Default logical topic names
pub mod topics {
    pub const UPLOADS: &str = "image-uploads";
    pub const TRANSLATE: &str = "translate-requests";
    pub const RESULT: &str = "translation-results";
    pub const READ: &str = "read-requests";
}

/// Built-in configuration defaults
pub mod defaults {
    pub const TARGET_LANGUAGES: &[&str] = &["en", "fr", "es", "de", "ja"];
    pub const RESULT_BUCKET: &str = "ocr-translation-results";
    /// Wait between the artifact write and its read request
    pub const READ_DELAY_MS: u64 = 3_000;
    pub const CALL_WEBHOOK_URL: &str = "https://localhost/ocr-call";
    pub const EMPTY_BODY_PLACEHOLDER: &str = "MESSAGE NOT FOUND";
}

/// Environment variables consulted at startup
pub mod env_vars {
    pub const ENVIRONMENT: &str = "PIPELINE_ENV";
    pub const APP_ENVIRONMENT: &str = "APP_ENV";
    pub const CONFIG_DIR: &str = "PIPELINE_CONFIG_DIR";
    /// Prefix of `PIPELINE__SECTION__KEY` overrides
    pub const CONFIG_PREFIX: &str = "PIPELINE";
    pub const LOG_FORMAT: &str = "PIPELINE_LOG_FORMAT";
}

/// Stage names used in logs and routing attributes
pub mod stages {
    pub const EXTRACTION: &str = "extraction";
    pub const TRANSLATION: &str = "translation";
    pub const PERSISTENCE: &str = "persistence";
    pub const RETRIEVAL: &str = "retrieval";
}
