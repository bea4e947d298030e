//! # External Collaborators
//!
//! Interfaces to the services the stages depend on but do not implement:
//! text detection (OCR), language detection, translation, blob storage and
//! notification delivery. Stages receive them as `Arc<dyn ..>` through
//! [`Collaborators`], so any of them can be replaced by a test double.
//!
//! All calls are suspension points; callers bound them with the invocation
//! deadline, so implementations do not need their own timeout handling.

pub mod errors;
pub mod in_memory;

pub use errors::{CollaboratorError, CollaboratorResult};
pub use in_memory::InMemoryBlobStore;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Reference to an object in blob storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub name: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.name)
    }
}

/// Language detected for a piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetection {
    /// ISO language code
    pub language: String,
    pub confidence: Option<f32>,
}

/// Acknowledgement returned once a blob write is durable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAck {
    pub bucket: String,
    pub key: String,
    /// Monotonic per-store version of the written object
    pub generation: u64,
    pub size: usize,
}

/// Open read stream for one blob
pub struct BlobReader {
    /// Generation of the object being read
    pub generation: u64,
    /// Content chunks, terminated by end-of-stream or an error
    pub chunks: BoxStream<'static, CollaboratorResult<Vec<u8>>>,
}

impl BlobReader {
    pub fn new(generation: u64, chunks: BoxStream<'static, CollaboratorResult<Vec<u8>>>) -> Self {
        Self { generation, chunks }
    }

    /// Concatenate every chunk as raw bytes. Decoding happens once at the end
    /// so multi-byte characters split across chunks stay intact.
    pub async fn read_to_end(mut self) -> CollaboratorResult<Vec<u8>> {
        let mut content = Vec::new();
        while let Some(chunk) = self.chunks.next().await {
            content.extend_from_slice(&chunk?);
        }
        Ok(content)
    }
}

impl fmt::Debug for BlobReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobReader")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// OCR engine
#[async_trait]
pub trait TextDetector: Send + Sync {
    /// Extract the text of an image; empty when the image holds no text
    async fn detect_text(&self, image: &ObjectRef) -> CollaboratorResult<String>;
}

#[async_trait]
pub trait LanguageDetector: Send + Sync {
    async fn detect_language(&self, text: &str) -> CollaboratorResult<LanguageDetection>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `to`; `from` is `None` when the source is unknown
    async fn translate(&self, text: &str, from: Option<&str>, to: &str)
        -> CollaboratorResult<String>;
}

/// Durable object store keyed by bucket and name
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `content`, overwriting any previous object under the same key
    async fn write(&self, bucket: &str, key: &str, content: Vec<u8>) -> CollaboratorResult<WriteAck>;

    /// Open a chunked read stream; `NotFound` when the key does not exist (yet)
    async fn read_stream(&self, bucket: &str, key: &str) -> CollaboratorResult<BlobReader>;
}

#[async_trait]
pub trait SmsNotifier: Send + Sync {
    /// Send an SMS, returning the provider message id
    async fn send(&self, body: &str) -> CollaboratorResult<String>;
}

#[async_trait]
pub trait CallNotifier: Send + Sync {
    /// Place a voice call driven by `webhook_url`, returning the provider call id
    async fn place(&self, webhook_url: &str) -> CollaboratorResult<String>;
}

/// Every collaborator a pipeline needs, injected at construction
#[derive(Clone)]
pub struct Collaborators {
    pub text_detector: Arc<dyn TextDetector>,
    pub language_detector: Arc<dyn LanguageDetector>,
    pub translator: Arc<dyn Translator>,
    pub blob_store: Arc<dyn BlobStore>,
    pub sms: Arc<dyn SmsNotifier>,
    pub call: Arc<dyn CallNotifier>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
