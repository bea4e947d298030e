//! # Pipeline Bootstrap
//!
//! Wires the four stages to their collaborators and routes each inbound topic
//! to the stage that consumes it.
//!
//! | Topic              | Payload              | Stage       |
//! |--------------------|----------------------|-------------|
//! | `topics.uploads`   | [`UploadEvent`]      | extraction  |
//! | `topics.translate` | [`TranslationRequest`] | translation |
//! | `topics.result`    | [`TranslationResult`] | persistence |
//! | `topics.read`      | [`ReadRequest`]      | retrieval   |

use crate::collaborators::Collaborators;
use crate::config::PipelineConfig;
use crate::constants::stages;
use crate::error::PipelineResult;
use crate::messaging::{
    decode_payload, MessagePublisher, PubsubMessage, ReadRequest, TranslationRequest,
    TranslationResult, UploadEvent,
};
use crate::stages::{
    ExtractionOutcome, ExtractionStage, InMemoryNotificationLedger, InvocationContext,
    NotificationLedger, PersistenceOutcome, PersistenceStage, RetrievalOutcome, RetrievalStage,
    TranslationOutcome, TranslationStage,
};
use std::sync::Arc;
use tracing::info;

/// The stage a topic is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Extraction,
    Translation,
    Persistence,
    Retrieval,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Extraction,
        StageKind::Translation,
        StageKind::Persistence,
        StageKind::Retrieval,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Extraction => stages::EXTRACTION,
            StageKind::Translation => stages::TRANSLATION,
            StageKind::Persistence => stages::PERSISTENCE,
            StageKind::Retrieval => stages::RETRIEVAL,
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one dispatched message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Extraction(ExtractionOutcome),
    Translation(TranslationOutcome),
    Persistence(PersistenceOutcome),
    Retrieval(RetrievalOutcome),
}

impl StageOutcome {
    pub fn stage(&self) -> StageKind {
        match self {
            StageOutcome::Extraction(_) => StageKind::Extraction,
            StageOutcome::Translation(_) => StageKind::Translation,
            StageOutcome::Persistence(_) => StageKind::Persistence,
            StageOutcome::Retrieval(_) => StageKind::Retrieval,
        }
    }
}

#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    extraction: ExtractionStage,
    translation: TranslationStage,
    persistence: PersistenceStage,
    retrieval: RetrievalStage,
}

impl Pipeline {
    /// Build a pipeline with an in-memory notification ledger
    pub fn new(
        config: PipelineConfig,
        publisher: Arc<dyn MessagePublisher>,
        collaborators: Collaborators,
    ) -> PipelineResult<Self> {
        let ledger = Arc::new(InMemoryNotificationLedger::new(
            config.notifications.dedup_ttl(),
        ));
        Self::with_ledger(config, publisher, collaborators, ledger)
    }

    pub fn with_ledger(
        config: PipelineConfig,
        publisher: Arc<dyn MessagePublisher>,
        collaborators: Collaborators,
        ledger: Arc<dyn NotificationLedger>,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let pipeline = Self {
            extraction: ExtractionStage::new(&config, Arc::clone(&publisher), &collaborators),
            translation: TranslationStage::new(&config, Arc::clone(&publisher), &collaborators),
            persistence: PersistenceStage::new(&config, Arc::clone(&publisher), &collaborators),
            retrieval: RetrievalStage::new(&config, &collaborators, ledger),
            config,
        };

        info!(
            publisher = publisher.client_type(),
            targets = ?pipeline.config.languages.targets,
            result_bucket = %pipeline.config.storage.result_bucket,
            "✅ PIPELINE: Stages initialized"
        );
        Ok(pipeline)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn topic_for(&self, stage: StageKind) -> &str {
        let topics = &self.config.topics;
        match stage {
            StageKind::Extraction => &topics.uploads,
            StageKind::Translation => &topics.translate,
            StageKind::Persistence => &topics.result,
            StageKind::Retrieval => &topics.read,
        }
    }

    pub fn stage_for(&self, topic: &str) -> Option<StageKind> {
        StageKind::ALL
            .into_iter()
            .find(|stage| self.topic_for(*stage) == topic)
    }

    /// Every topic the pipeline consumes, in stage order
    pub fn subscribed_topics(&self) -> Vec<&str> {
        StageKind::ALL
            .iter()
            .map(|stage| self.topic_for(*stage))
            .collect()
    }

    /// Decode `message` and run the stage subscribed to `topic`.
    /// Returns `Ok(None)` for a topic no stage consumes.
    pub async fn dispatch(
        &self,
        topic: &str,
        message: &PubsubMessage,
        ctx: &InvocationContext,
    ) -> PipelineResult<Option<StageOutcome>> {
        let Some(stage) = self.stage_for(topic) else {
            return Ok(None);
        };

        let outcome = match stage {
            StageKind::Extraction => {
                let event: UploadEvent = decode_payload(message)?;
                StageOutcome::Extraction(self.extraction.handle(&event, ctx).await?)
            }
            StageKind::Translation => {
                let request: TranslationRequest = decode_payload(message)?;
                StageOutcome::Translation(self.translation.handle(&request, ctx).await?)
            }
            StageKind::Persistence => {
                let result: TranslationResult = decode_payload(message)?;
                StageOutcome::Persistence(self.persistence.handle(&result, ctx).await?)
            }
            StageKind::Retrieval => {
                let request: ReadRequest = decode_payload(message)?;
                StageOutcome::Retrieval(self.retrieval.handle(&request, ctx).await?)
            }
        };
        Ok(Some(outcome))
    }
}
