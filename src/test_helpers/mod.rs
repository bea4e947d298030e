// Test Helpers Module - Pipeline Testing Infrastructure
//
// Provides in-process fakes for every external collaborator plus small setup
// helpers, shared by unit tests and the integration tests under tests/.

pub mod collaborators;
pub mod test_utils;

pub use collaborators::{
    DictionaryTranslator, RecordingCallNotifier, RecordingSmsNotifier, StaticLanguageDetector,
    StaticTextDetector, TestCollaborators,
};

pub use test_utils::{init_test_logging, test_config};
