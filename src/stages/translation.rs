//! # Translation Stage
//!
//! Translates one request into its target language and publishes the result.

use crate::collaborators::{Collaborators, Translator};
use crate::config::PipelineConfig;
use crate::constants::stages;
use crate::error::PipelineResult;
use crate::logging::log_stage_operation;
use crate::messaging::{routing_attributes, MessagePublisher, TranslationRequest, TranslationResult};
use crate::stages::{publish_payload, InvocationContext};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationOutcome {
    pub filename: String,
    pub lang: String,
    /// Id of the message published to the result topic
    pub message_id: String,
    /// False when the translator was skipped because the text was empty
    pub translated: bool,
}

pub struct TranslationStage {
    publisher: Arc<dyn MessagePublisher>,
    translator: Arc<dyn Translator>,
    result_topic: String,
}

impl std::fmt::Debug for TranslationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationStage")
            .field("result_topic", &self.result_topic)
            .finish_non_exhaustive()
    }
}

impl TranslationStage {
    pub fn new(
        config: &PipelineConfig,
        publisher: Arc<dyn MessagePublisher>,
        collaborators: &Collaborators,
    ) -> Self {
        Self {
            publisher,
            translator: Arc::clone(&collaborators.translator),
            result_topic: config.topics.result.clone(),
        }
    }

    pub async fn handle(
        &self,
        request: &TranslationRequest,
        ctx: &InvocationContext,
    ) -> PipelineResult<TranslationOutcome> {
        let job = request.validate()?;

        let (text, translated) = if job.text.is_empty() {
            debug!(filename = %job.filename, lang = %job.lang, "Empty text, skipping translator");
            (String::new(), false)
        } else {
            let text = self.translator.translate(job.text, job.from, job.lang).await?;
            (text, true)
        };

        let result = TranslationResult::new(text, job.filename, job.lang);
        let message_id = publish_payload(
            self.publisher.as_ref(),
            &self.result_topic,
            &result,
            routing_attributes(stages::TRANSLATION, job.filename, job.lang),
            None,
        )
        .await?;

        info!(
            delivery_id = %ctx.delivery_id,
            filename = %job.filename,
            from = job.from,
            lang = %job.lang,
            message_id = %message_id,
            "Translation published"
        );
        log_stage_operation(
            stages::TRANSLATION,
            "translate",
            Some(job.filename),
            Some(job.lang),
            "completed",
            None,
        );

        Ok(TranslationOutcome {
            filename: job.filename.to_string(),
            lang: job.lang.to_string(),
            message_id,
            translated,
        })
    }
}
