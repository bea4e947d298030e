//! # Artifact Naming
//!
//! Deterministic mapping from a source filename and a target language to the
//! blob-store key of the translated artifact. The persistence stage writes
//! under this key and the retrieval stage reads it back, so both must go
//! through [`ArtifactName::derive`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the source filename and the language tag
pub const LANGUAGE_SEPARATOR: &str = "_to_";

/// Extension appended to every artifact key
pub const ARTIFACT_EXTENSION: &str = ".txt";

/// Blob-store key addressing one translated artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactName(String);

impl ArtifactName {
    /// `filename + "_to_" + lang + ".txt"`. Total and side-effect free.
    pub fn derive(filename: &str, lang: &str) -> Self {
        let mut name = String::with_capacity(
            filename.len() + LANGUAGE_SEPARATOR.len() + lang.len() + ARTIFACT_EXTENSION.len(),
        );
        name.push_str(filename);
        name.push_str(LANGUAGE_SEPARATOR);
        name.push_str(lang);
        name.push_str(ARTIFACT_EXTENSION);
        Self(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_appends_language_and_extension() {
        let name = ArtifactName::derive("a.jpg", "en");
        assert_eq!(name.as_str(), "a.jpg_to_en.txt");
    }

    #[test]
    fn test_derive_is_deterministic() {
        let first = ArtifactName::derive("receipts/7eleven.png", "fr");
        let second = ArtifactName::derive("receipts/7eleven.png", "fr");
        assert_eq!(first, second);
        assert_eq!(first.to_string(), "receipts/7eleven.png_to_fr.txt");
    }

    #[test]
    fn test_distinct_languages_give_distinct_names() {
        assert_ne!(
            ArtifactName::derive("cf.png", "en"),
            ArtifactName::derive("cf.png", "es")
        );
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&ArtifactName::derive("x", "de")).unwrap();
        assert_eq!(json, "\"x_to_de.txt\"");
    }
}
