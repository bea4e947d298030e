#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # OCR Translate Pipeline
//!
//! Event-driven pipeline that turns an uploaded image into translated text
//! artifacts and notifications.
//!
//! ## Overview
//!
//! Four stateless stages communicate only through topics on an
//! at-least-once, unordered message bus:
//!
//! 1. **Extraction**: OCR plus language detection on an upload, then fan-out of
//!    one message per configured target language.
//! 2. **Translation**: translate text into one target language.
//! 3. **Persistence**: write the result under `{filename}_to_{lang}.txt`, then
//!    schedule a delayed read request.
//! 4. **Retrieval**: read the artifact back and deliver it over SMS and a
//!    voice call, once per distinct content.
//!
//! Every external service (OCR, language detection, translation, blob storage,
//! SMS, voice) is injected through [`collaborators::Collaborators`], and the bus
//! through [`messaging::MessagePublisher`] / [`messaging::MessageSubscriber`].
//!
//! ## Module Organization
//!
//! - [`artifact`] - Artifact naming
//! - [`collaborators`] - External service traits and an in-memory blob store
//! - [`config`] - Layered configuration
//! - [`error`] - Pipeline errors and their delivery disposition
//! - [`messaging`] - Payloads, envelope codec and bus clients
//! - [`orchestration`] - Topic routing and the delivery host
//! - [`resilience`] - Bounded retry with backoff
//! - [`stages`] - The four stage handlers
//!
//! ## Quick Start
//!
//! ```rust
//! use ocr_pipeline::messaging::{encode_payload, InMemoryBus, MessagePublisher, UploadEvent};
//! use ocr_pipeline::orchestration::{Pipeline, PipelineHost};
//! use ocr_pipeline::test_helpers::{test_config, TestCollaborators};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let mut config = test_config(&["en", "fr"]);
//! config.persistence.read_delay_ms = 0;
//!
//! let bus = Arc::new(InMemoryBus::new());
//! let fakes = TestCollaborators::new().with_text("menu.jpg", "hello", "en");
//! let pipeline = Pipeline::new(config, bus.clone(), fakes.bundle())?;
//! let host = PipelineHost::new(Arc::new(pipeline), bus.clone());
//!
//! let upload = encode_payload(&UploadEvent::new("uploads", "menu.jpg"))?;
//! bus.publish(&host.pipeline().config().topics.uploads, upload).await?;
//! host.run_until_idle(100).await?;
//!
//! assert_eq!(fakes.sms.sent().len(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

pub mod artifact;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod orchestration;
pub mod resilience;
pub mod stages;
pub mod test_helpers;

pub use artifact::ArtifactName;
pub use collaborators::{CollaboratorError, Collaborators};
pub use config::{ConfigManager, PipelineConfig};
pub use error::{ErrorDisposition, PipelineError, PipelineResult};
pub use messaging::{MessagePublisher, MessageSubscriber, MessagingError};
pub use orchestration::{Pipeline, PipelineHost};
