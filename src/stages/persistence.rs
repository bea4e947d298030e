//! # Persistence Stage
//!
//! Writes each result to the result bucket under its derived artifact name,
//! then schedules a read request for the artifact. The read request is only
//! published once the write is acknowledged and carries the acknowledged
//! generation, so retrieval can tell a stale read from a fresh one.

use crate::artifact::ArtifactName;
use crate::collaborators::{BlobStore, Collaborators};
use crate::config::PipelineConfig;
use crate::constants::stages;
use crate::error::PipelineResult;
use crate::logging::log_stage_operation;
use crate::messaging::{routing_attributes, MessagePublisher, ReadRequest, TranslationResult};
use crate::stages::{publish_payload, InvocationContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceOutcome {
    pub artifact: ArtifactName,
    pub generation: u64,
    pub bytes_written: usize,
    /// Id of the scheduled read request
    pub read_message_id: String,
    pub read_delay: Duration,
}

pub struct PersistenceStage {
    publisher: Arc<dyn MessagePublisher>,
    blob_store: Arc<dyn BlobStore>,
    result_bucket: String,
    read_topic: String,
    read_delay: Duration,
}

impl std::fmt::Debug for PersistenceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceStage")
            .field("result_bucket", &self.result_bucket)
            .field("read_topic", &self.read_topic)
            .field("read_delay", &self.read_delay)
            .finish_non_exhaustive()
    }
}

impl PersistenceStage {
    pub fn new(
        config: &PipelineConfig,
        publisher: Arc<dyn MessagePublisher>,
        collaborators: &Collaborators,
    ) -> Self {
        Self {
            publisher,
            blob_store: Arc::clone(&collaborators.blob_store),
            result_bucket: config.storage.result_bucket.clone(),
            read_topic: config.topics.read.clone(),
            read_delay: config.persistence.read_delay(),
        }
    }

    pub async fn handle(
        &self,
        result: &TranslationResult,
        ctx: &InvocationContext,
    ) -> PipelineResult<PersistenceOutcome> {
        let write = result.validate()?;
        let artifact = write.artifact_name();

        let ack = self
            .blob_store
            .write(
                &self.result_bucket,
                artifact.as_str(),
                write.text.as_bytes().to_vec(),
            )
            .await?;
        info!(
            delivery_id = %ctx.delivery_id,
            bucket = %ack.bucket,
            artifact = %artifact,
            generation = ack.generation,
            size = ack.size,
            "Artifact written"
        );

        let read = ReadRequest::new(write.filename, write.lang).with_generation(ack.generation);
        let read_message_id = publish_payload(
            self.publisher.as_ref(),
            &self.read_topic,
            &read,
            routing_attributes(stages::PERSISTENCE, write.filename, write.lang),
            Some(self.read_delay),
        )
        .await?;

        log_stage_operation(
            stages::PERSISTENCE,
            "schedule_read",
            Some(write.filename),
            Some(write.lang),
            "completed",
            Some(&format!("delay_ms={}", self.read_delay.as_millis())),
        );

        Ok(PersistenceOutcome {
            artifact,
            generation: ack.generation,
            bytes_written: ack.size,
            read_message_id,
            read_delay: self.read_delay,
        })
    }
}
