//! # Test Utilities
//!
//! Setup helpers for tests that drive stages or a whole pipeline in-process.

use crate::config::PipelineConfig;
use crate::logging::init_structured_logging;

/// Install the structured logger once for the test binary
pub fn init_test_logging() {
    init_structured_logging();
}

/// Default configuration targeting exactly `targets`
pub fn test_config(targets: &[&str]) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.languages.targets = targets.iter().map(|target| target.to_string()).collect();
    config
}
