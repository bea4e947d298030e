//! # Extraction Stage
//!
//! Reacts to an image upload: detects its text, detects the text's language,
//! then fans out one message per configured target language. Targets equal to
//! the detected language skip translation and go straight to the result topic.

use crate::collaborators::{Collaborators, LanguageDetector, ObjectRef, TextDetector};
use crate::config::PipelineConfig;
use crate::constants::stages;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::log_stage_operation;
use crate::messaging::{routing_attributes, ExtractedText, MessagePublisher, MessagingError, UploadEvent};
use crate::stages::{publish_payload, InvocationContext};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// The upload needed no processing (deletion notification)
    Ignored { reason: String },
    FannedOut {
        filename: String,
        source_language: String,
        /// Messages sent to the translate topic
        translation_requests: usize,
        /// Same-language messages sent straight to the result topic
        direct_results: usize,
    },
}

impl ExtractionOutcome {
    /// Total messages emitted
    pub fn published(&self) -> usize {
        match self {
            Self::Ignored { .. } => 0,
            Self::FannedOut {
                translation_requests,
                direct_results,
                ..
            } => translation_requests + direct_results,
        }
    }
}

/// Where one target language is routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Translate,
    Direct,
}

pub struct ExtractionStage {
    publisher: Arc<dyn MessagePublisher>,
    text_detector: Arc<dyn TextDetector>,
    language_detector: Arc<dyn LanguageDetector>,
    translate_topic: String,
    result_topic: String,
    target_languages: Vec<String>,
}

impl std::fmt::Debug for ExtractionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionStage")
            .field("translate_topic", &self.translate_topic)
            .field("result_topic", &self.result_topic)
            .field("target_languages", &self.target_languages)
            .finish_non_exhaustive()
    }
}

impl ExtractionStage {
    pub fn new(
        config: &PipelineConfig,
        publisher: Arc<dyn MessagePublisher>,
        collaborators: &Collaborators,
    ) -> Self {
        Self {
            publisher,
            text_detector: Arc::clone(&collaborators.text_detector),
            language_detector: Arc::clone(&collaborators.language_detector),
            translate_topic: config.topics.translate.clone(),
            result_topic: config.topics.result.clone(),
            target_languages: config.languages.targets.clone(),
        }
    }

    pub async fn handle(
        &self,
        event: &UploadEvent,
        ctx: &InvocationContext,
    ) -> PipelineResult<ExtractionOutcome> {
        if event.is_deletion() {
            debug!(
                delivery_id = %ctx.delivery_id,
                name = event.name.as_deref(),
                "Ignoring deletion notification"
            );
            return Ok(ExtractionOutcome::Ignored {
                reason: "object no longer exists".to_string(),
            });
        }

        let image = event.validate()?;
        log_stage_operation(
            stages::EXTRACTION,
            "detect_text",
            Some(&image.name),
            None,
            "started",
            None,
        );

        let extracted = self.extract(&image).await?;
        info!(
            delivery_id = %ctx.delivery_id,
            filename = %extracted.filename,
            source_language = %extracted.source_language,
            characters = extracted.text.chars().count(),
            "Extracted text from upload"
        );

        self.fan_out(&extracted).await
    }

    async fn extract(&self, image: &ObjectRef) -> PipelineResult<ExtractedText> {
        let text = self.text_detector.detect_text(image).await?;
        let detection = self.language_detector.detect_language(&text).await?;
        Ok(ExtractedText {
            filename: image.name.clone(),
            source_language: detection.language,
            text,
        })
    }

    fn route_for(&self, extracted: &ExtractedText, target_language: &str) -> Route {
        if extracted.is_already_in(target_language) {
            Route::Direct
        } else {
            Route::Translate
        }
    }

    /// Publish one message per target language. Every publish is attempted;
    /// the stage fails if any of them failed so the upload is redelivered.
    async fn fan_out(&self, extracted: &ExtractedText) -> PipelineResult<ExtractionOutcome> {
        let publishes = self.target_languages.iter().map(|lang| {
            let route = self.route_for(extracted, lang);
            async move {
                let result = self.publish_route(extracted, lang, route).await;
                (lang.as_str(), route, result)
            }
        });
        let results = join_all(publishes).await;

        let mut translation_requests = 0;
        let mut direct_results = 0;
        let mut failures = Vec::new();
        let mut failed_topics: Vec<&str> = Vec::new();
        for (lang, route, result) in results {
            match result {
                Ok(message_id) => {
                    debug!(filename = %extracted.filename, lang, ?route, message_id = %message_id, "Fan-out message published");
                    match route {
                        Route::Translate => translation_requests += 1,
                        Route::Direct => direct_results += 1,
                    }
                }
                Err(err) => {
                    let topic = self.topic_for(route);
                    warn!(filename = %extracted.filename, lang, topic, error = %err, "Fan-out publish failed");
                    if !failed_topics.contains(&topic) {
                        failed_topics.push(topic);
                    }
                    failures.push(format!("{lang} via {topic}: {err}"));
                }
            }
        }

        if !failures.is_empty() {
            return Err(PipelineError::MessagingError(MessagingError::publish(
                failed_topics.join(","),
                format!(
                    "{} of {} fan-out publishes failed for {} ({})",
                    failures.len(),
                    self.target_languages.len(),
                    extracted.filename,
                    failures.join("; ")
                ),
            )));
        }

        log_stage_operation(
            stages::EXTRACTION,
            "fan_out",
            Some(&extracted.filename),
            Some(&extracted.source_language),
            "completed",
            Some(&format!(
                "{translation_requests} translate, {direct_results} direct"
            )),
        );

        Ok(ExtractionOutcome::FannedOut {
            filename: extracted.filename.clone(),
            source_language: extracted.source_language.clone(),
            translation_requests,
            direct_results,
        })
    }

    fn topic_for(&self, route: Route) -> &str {
        match route {
            Route::Translate => &self.translate_topic,
            Route::Direct => &self.result_topic,
        }
    }

    async fn publish_route(
        &self,
        extracted: &ExtractedText,
        lang: &str,
        route: Route,
    ) -> PipelineResult<String> {
        let request = extracted.request_for(lang);
        let attributes = routing_attributes(stages::EXTRACTION, &extracted.filename, lang);
        let topic = self.topic_for(route);
        match route {
            Route::Translate => {
                publish_payload(self.publisher.as_ref(), topic, &request, attributes, None).await
            }
            Route::Direct => {
                publish_payload(
                    self.publisher.as_ref(),
                    topic,
                    &request.into_direct_result(),
                    attributes,
                    None,
                )
                .await
            }
        }
    }
}
