//! # Pipeline Message Payloads
//!
//! Payload shapes carried on the bus. Fields arrive as optionals so that a
//! missing field is reported as a validation failure by the consuming stage
//! rather than as an opaque decode error. Each payload has a `validate` method
//! returning a borrowed view with the required fields resolved.

use crate::artifact::ArtifactName;
use crate::collaborators::ObjectRef;
use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// State of the storage object referenced by an upload notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    #[default]
    Exists,
    NotExists,
}

/// Storage notification that triggers extraction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, alias = "objectName", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "resourceState")]
    pub resource_state: ResourceState,
}

impl UploadEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: Some(bucket.into()),
            name: Some(name.into()),
            resource_state: ResourceState::Exists,
        }
    }

    pub fn deletion(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_state: ResourceState::NotExists,
            ..Self::new(bucket, name)
        }
    }

    /// Deletion notifications carry no image to process
    pub fn is_deletion(&self) -> bool {
        self.resource_state == ResourceState::NotExists
    }

    pub fn validate(&self) -> PipelineResult<ObjectRef> {
        let bucket = require_non_empty(&self.bucket, "bucket", "upload event")?;
        let name = require_non_empty(&self.name, "name", "upload event")?;
        Ok(ObjectRef::new(bucket, name))
    }
}

/// Text extracted from one uploaded image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub filename: String,
    pub source_language: String,
    pub text: String,
}

impl ExtractedText {
    /// Outbound payload for one target language
    pub fn request_for(&self, target_language: &str) -> TranslationRequest {
        TranslationRequest::new(
            self.text.clone(),
            self.filename.clone(),
            target_language,
            self.source_language.clone(),
        )
    }

    pub fn is_already_in(&self, target_language: &str) -> bool {
        self.source_language == target_language
    }
}

/// Request to translate extracted text into one target language
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

/// Validated view of a [`TranslationRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationJob<'a> {
    pub text: &'a str,
    pub filename: &'a str,
    pub lang: &'a str,
    pub from: Option<&'a str>,
}

impl TranslationRequest {
    pub fn new(
        text: impl Into<String>,
        filename: impl Into<String>,
        lang: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            text: Some(text.into()),
            filename: Some(filename.into()),
            lang: Some(lang.into()),
            from: Some(from.into()),
        }
    }

    /// `text` must be present but may be empty: a blank image still produces
    /// an (empty) artifact per language, announced with the placeholder body.
    /// `from` is optional and left to the translator to detect.
    pub fn validate(&self) -> PipelineResult<TranslationJob<'_>> {
        Ok(TranslationJob {
            text: require_present(&self.text, "text", "request")?,
            filename: require_non_empty(&self.filename, "filename", "request")?,
            lang: require_non_empty(&self.lang, "lang", "request")?,
            from: self.from.as_deref().filter(|from| !from.is_empty()),
        })
    }

    /// The same-language shortcut: the request re-shaped as a result, text untouched.
    /// The source language is dropped because the result topic does not carry it.
    pub fn into_direct_result(self) -> TranslationResult {
        TranslationResult {
            text: self.text,
            filename: self.filename,
            lang: self.lang,
        }
    }
}

/// Translated (or same-language) text ready to be persisted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

/// Validated view of a [`TranslationResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactWrite<'a> {
    pub text: &'a str,
    pub filename: &'a str,
    pub lang: &'a str,
}

impl ArtifactWrite<'_> {
    pub fn artifact_name(&self) -> ArtifactName {
        ArtifactName::derive(self.filename, self.lang)
    }
}

impl TranslationResult {
    pub fn new(
        text: impl Into<String>,
        filename: impl Into<String>,
        lang: impl Into<String>,
    ) -> Self {
        Self {
            text: Some(text.into()),
            filename: Some(filename.into()),
            lang: Some(lang.into()),
        }
    }

    /// Like [`TranslationRequest::validate`], empty `text` is accepted
    pub fn validate(&self) -> PipelineResult<ArtifactWrite<'_>> {
        Ok(ArtifactWrite {
            text: require_present(&self.text, "text", "request")?,
            filename: require_non_empty(&self.filename, "filename", "request")?,
            lang: require_non_empty(&self.lang, "lang", "request")?,
        })
    }
}

/// Request to read a persisted artifact back and notify
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Storage generation acknowledged by the write this request follows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
}

/// Validated view of a [`ReadRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactRead<'a> {
    pub filename: &'a str,
    pub lang: &'a str,
    pub min_generation: Option<u64>,
}

impl ArtifactRead<'_> {
    pub fn artifact_name(&self) -> ArtifactName {
        ArtifactName::derive(self.filename, self.lang)
    }
}

impl ReadRequest {
    pub fn new(filename: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            lang: Some(lang.into()),
            generation: None,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn validate(&self) -> PipelineResult<ArtifactRead<'_>> {
        Ok(ArtifactRead {
            filename: require_non_empty(&self.filename, "filename", "request")?,
            lang: require_non_empty(&self.lang, "lang", "request")?,
            min_generation: self.generation,
        })
    }
}

/// Field must be present; empty is allowed
fn require_present<'a>(
    value: &'a Option<String>,
    field: &str,
    payload: &str,
) -> PipelineResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| PipelineError::missing_field(field, payload))
}

/// Field must be present and non-empty
fn require_non_empty<'a>(
    value: &'a Option<String>,
    field: &str,
    payload: &str,
) -> PipelineResult<&'a str> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PipelineError::missing_field(field, payload)),
    }
}
