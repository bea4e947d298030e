//! # Retrieval Stage
//!
//! Reads a persisted artifact back as a stream and delivers its content over
//! SMS, followed by a voice call. The artifact may not be visible yet when the
//! read request arrives, so missing or stale reads are retried with backoff
//! until the invocation deadline. Notification failures are logged and never
//! fail the stage: the artifact itself was retrieved successfully.

use crate::artifact::ArtifactName;
use crate::collaborators::{
    BlobStore, CallNotifier, CollaboratorError, CollaboratorResult, Collaborators, SmsNotifier,
};
use crate::config::{NotificationsConfig, PipelineConfig};
use crate::constants::stages;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::{log_error, log_stage_operation};
use crate::messaging::ReadRequest;
use crate::resilience::RetryPolicy;
use crate::stages::dedup::{notification_key, NotificationClaim, NotificationLedger};
use crate::stages::InvocationContext;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one notification channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Provider accepted the notification and returned this id
    Sent(String),
    Failed(String),
    Skipped,
}

impl ChannelStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationReport {
    pub sms: ChannelStatus,
    pub call: ChannelStatus,
}

impl NotificationReport {
    fn skipped() -> Self {
        Self {
            sms: ChannelStatus::Skipped,
            call: ChannelStatus::Skipped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalOutcome {
    Delivered {
        artifact: ArtifactName,
        content: String,
        generation: u64,
        notifications: NotificationReport,
    },
    /// The same content was already delivered for this artifact
    DuplicateSuppressed {
        artifact: ArtifactName,
        generation: u64,
    },
}

impl RetrievalOutcome {
    pub fn artifact(&self) -> &ArtifactName {
        match self {
            Self::Delivered { artifact, .. } | Self::DuplicateSuppressed { artifact, .. } => artifact,
        }
    }
}

pub struct RetrievalStage {
    blob_store: Arc<dyn BlobStore>,
    sms: Arc<dyn SmsNotifier>,
    call: Arc<dyn CallNotifier>,
    ledger: Arc<dyn NotificationLedger>,
    retry_policy: RetryPolicy,
    result_bucket: String,
    notifications: NotificationsConfig,
}

impl std::fmt::Debug for RetrievalStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalStage")
            .field("result_bucket", &self.result_bucket)
            .field("retry_policy", &self.retry_policy)
            .field("notifications_enabled", &self.notifications.enabled)
            .finish_non_exhaustive()
    }
}

impl RetrievalStage {
    pub fn new(
        config: &PipelineConfig,
        collaborators: &Collaborators,
        ledger: Arc<dyn NotificationLedger>,
    ) -> Self {
        Self {
            blob_store: Arc::clone(&collaborators.blob_store),
            sms: Arc::clone(&collaborators.sms),
            call: Arc::clone(&collaborators.call),
            ledger,
            retry_policy: RetryPolicy::from_config(&config.retrieval),
            result_bucket: config.storage.result_bucket.clone(),
            notifications: config.notifications.clone(),
        }
    }

    pub async fn handle(
        &self,
        request: &ReadRequest,
        ctx: &InvocationContext,
    ) -> PipelineResult<RetrievalOutcome> {
        let read = request.validate()?;
        let artifact = read.artifact_name();

        let (generation, content) = match self
            .read_artifact(&artifact, read.min_generation, ctx)
            .await
        {
            Ok(found) => found,
            Err(err) => {
                log_error(
                    stages::RETRIEVAL,
                    "read_artifact",
                    &err.to_string(),
                    Some(artifact.as_str()),
                );
                return Err(err.into());
            }
        };
        info!(
            delivery_id = %ctx.delivery_id,
            artifact = %artifact,
            generation,
            characters = content.chars().count(),
            "Artifact retrieved"
        );

        if !self.notifications.enabled {
            debug!(artifact = %artifact, "Notifications disabled");
            return Ok(RetrievalOutcome::Delivered {
                artifact,
                content,
                generation,
                notifications: NotificationReport::skipped(),
            });
        }

        let key = notification_key(&artifact, &content);
        let Some(claim) = NotificationClaim::acquire(self.ledger.as_ref(), key) else {
            info!(
                delivery_id = %ctx.delivery_id,
                artifact = %artifact,
                attempt = ctx.attempt,
                "Notification already delivered, suppressing duplicate"
            );
            return Ok(RetrievalOutcome::DuplicateSuppressed {
                artifact,
                generation,
            });
        };

        // A timeout while notifying drops the claim, releasing it for the redelivery
        let notifications = self.notify(&artifact, &content).await;
        claim.commit();
        log_stage_operation(
            stages::RETRIEVAL,
            "notify",
            Some(read.filename),
            Some(read.lang),
            if notifications.sms.is_sent() && notifications.call.is_sent() {
                "completed"
            } else {
                "degraded"
            },
            None,
        );

        Ok(RetrievalOutcome::Delivered {
            artifact,
            content,
            generation,
            notifications,
        })
    }

    /// Read the artifact, retrying while it is missing or older than
    /// `min_generation`. Returns the generation read and the decoded content.
    async fn read_artifact(
        &self,
        artifact: &ArtifactName,
        min_generation: Option<u64>,
        ctx: &InvocationContext,
    ) -> CollaboratorResult<(u64, String)> {
        let store = self.blob_store.as_ref();
        let bucket = self.result_bucket.as_str();
        let key = artifact.as_str();

        let (generation, bytes) = self
            .retry_policy
            .run(
                "read_artifact",
                Some(ctx.deadline),
                |_attempt| async move { read_once(store, bucket, key, min_generation).await },
                CollaboratorError::is_not_found,
            )
            .await?;

        // Chunks were joined as bytes, so only content that is not UTF-8 at
        // all is altered here
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(err) => {
                warn!(artifact = %artifact, "Artifact is not valid UTF-8, decoding lossily");
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };
        Ok((generation, content))
    }

    async fn notify(&self, artifact: &ArtifactName, content: &str) -> NotificationReport {
        let body = if content.is_empty() {
            self.notifications.empty_body_placeholder.as_str()
        } else {
            content
        };

        let sms = match self.sms.send(body).await {
            Ok(id) => {
                info!(artifact = %artifact, sms_id = %id, "SMS sent");
                ChannelStatus::Sent(id)
            }
            Err(err) => Self::notification_failed(artifact, "sms", err),
        };

        let call = match self.call.place(&self.notifications.call_webhook_url).await {
            Ok(id) => {
                info!(artifact = %artifact, call_id = %id, "Call placed");
                ChannelStatus::Sent(id)
            }
            Err(err) => Self::notification_failed(artifact, "call", err),
        };

        NotificationReport { sms, call }
    }

    fn notification_failed(
        artifact: &ArtifactName,
        channel: &str,
        err: CollaboratorError,
    ) -> ChannelStatus {
        let err = PipelineError::NotificationError(format!("{channel}: {err}"));
        log_error(
            stages::RETRIEVAL,
            "notify",
            &err.to_string(),
            Some(artifact.as_str()),
        );
        ChannelStatus::Failed(err.to_string())
    }
}

async fn read_once(
    store: &dyn BlobStore,
    bucket: &str,
    key: &str,
    min_generation: Option<u64>,
) -> CollaboratorResult<(u64, Vec<u8>)> {
    let reader = store.read_stream(bucket, key).await?;
    if let Some(expected) = min_generation {
        if reader.generation < expected {
            return Err(CollaboratorError::not_found(
                "blob_store",
                format!(
                    "{bucket}/{key} at generation {expected} (found {})",
                    reader.generation
                ),
            ));
        }
    }
    let generation = reader.generation;
    let bytes = reader.read_to_end().await?;
    Ok((generation, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::InMemoryBlobStore;
    use crate::stages::InMemoryNotificationLedger;
    use crate::test_helpers::TestCollaborators;
    use std::time::Duration;

    struct Fixture {
        config: PipelineConfig,
        store: Arc<InMemoryBlobStore>,
        fakes: TestCollaborators,
        stage: RetrievalStage,
    }

    fn fixture(store: InMemoryBlobStore) -> Fixture {
        let config = PipelineConfig::default();
        let store = Arc::new(store);
        let fakes = TestCollaborators::new().with_blob_store(store.clone());
        let ledger = Arc::new(InMemoryNotificationLedger::new(config.notifications.dedup_ttl()));
        let stage = RetrievalStage::new(&config, &fakes.bundle(), ledger);
        Fixture {
            config,
            store,
            fakes,
            stage,
        }
    }

    fn ctx() -> InvocationContext {
        InvocationContext::detached(Duration::from_secs(60))
    }

    async fn put(f: &Fixture, key: &str, content: &str) -> u64 {
        f.store
            .write(&f.config.storage.result_bucket, key, content.as_bytes().to_vec())
            .await
            .unwrap()
            .generation
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_content_and_notifies() {
        let f = fixture(InMemoryBlobStore::new().with_chunk_size(3));
        let generation = put(&f, "menu.jpg_to_en.txt", "hello world").await;

        let outcome = f
            .stage
            .handle(&ReadRequest::new("menu.jpg", "en").with_generation(generation), &ctx())
            .await
            .unwrap();

        match outcome {
            RetrievalOutcome::Delivered {
                content,
                notifications,
                ..
            } => {
                assert_eq!(content, "hello world");
                assert!(notifications.sms.is_sent());
                assert!(notifications.call.is_sent());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(f.fakes.sms.sent(), vec!["hello world".to_string()]);
        assert_eq!(
            f.fakes.call.placed(),
            vec![f.config.notifications.call_webhook_url.clone()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_artifact_sends_placeholder() {
        let f = fixture(InMemoryBlobStore::new());
        put(&f, "blank.jpg_to_fr.txt", "").await;

        f.stage
            .handle(&ReadRequest::new("blank.jpg", "fr"), &ctx())
            .await
            .unwrap();
        assert_eq!(
            f.fakes.sms.sent(),
            vec![f.config.notifications.empty_body_placeholder.clone()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_written_artifact_fails_without_notifying() {
        let f = fixture(InMemoryBlobStore::new());

        let err = f
            .stage
            .handle(&ReadRequest::new("ghost.jpg", "en"), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::CollaboratorError(CollaboratorError::NotFound { .. })
        ));
        assert!(f.fakes.sms.sent().is_empty());
        assert!(f.fakes.call.placed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_write_to_become_visible() {
        let f = fixture(InMemoryBlobStore::new().with_visibility_lag(Duration::from_millis(600)));
        let generation = put(&f, "a.jpg_to_en.txt", "fresh").await;

        let outcome = f
            .stage
            .handle(&ReadRequest::new("a.jpg", "en").with_generation(generation), &ctx())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            RetrievalOutcome::Delivered { ref content, .. } if content == "fresh"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_not_delivered() {
        let f = fixture(InMemoryBlobStore::new().with_visibility_lag(Duration::from_secs(10)));
        put(&f, "a.jpg_to_en.txt", "old").await;
        tokio::time::advance(Duration::from_secs(11)).await;
        let newer = put(&f, "a.jpg_to_en.txt", "new").await;

        // "old" stays visible for the whole retry window; the request asks for "new"
        let err = f
            .stage
            .handle(&ReadRequest::new("a.jpg", "en").with_generation(newer), &ctx())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(f.fakes.sms.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_redelivery_does_not_notify_twice() {
        let f = fixture(InMemoryBlobStore::new());
        put(&f, "a.jpg_to_en.txt", "hello").await;
        let request = ReadRequest::new("a.jpg", "en");

        f.stage.handle(&request, &ctx()).await.unwrap();
        let second = f
            .stage
            .handle(&request, &InvocationContext::new("redelivered", 2, Duration::from_secs(60)))
            .await
            .unwrap();

        assert!(matches!(second, RetrievalOutcome::DuplicateSuppressed { .. }));
        assert_eq!(f.fakes.sms.sent().len(), 1);
        assert_eq!(f.fakes.call.placed().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_notification_is_sent_on_redelivery() {
        let f = fixture(InMemoryBlobStore::new());
        put(&f, "a.jpg_to_en.txt", "hello").await;
        f.fakes.sms.stall_next(Duration::from_secs(120));
        let request = ReadRequest::new("a.jpg", "en");

        let timed_out =
            tokio::time::timeout(Duration::from_secs(60), f.stage.handle(&request, &ctx())).await;
        assert!(timed_out.is_err());
        assert!(f.fakes.sms.sent().is_empty());

        let outcome = f
            .stage
            .handle(&request, &InvocationContext::new("redelivered", 2, Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(matches!(outcome, RetrievalOutcome::Delivered { .. }));
        assert_eq!(f.fakes.sms.sent(), vec!["hello".to_string()]);
        assert_eq!(f.fakes.sms.attempts(), 2);
        assert_eq!(f.fakes.call.placed().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_failures_do_not_fail_the_stage() {
        let f = fixture(InMemoryBlobStore::new());
        put(&f, "a.jpg_to_en.txt", "hello").await;
        f.fakes.sms.fail_next(1);

        let outcome = f
            .stage
            .handle(&ReadRequest::new("a.jpg", "en"), &ctx())
            .await
            .unwrap();
        match outcome {
            RetrievalOutcome::Delivered { notifications, .. } => {
                assert!(matches!(notifications.sms, ChannelStatus::Failed(_)));
                assert!(notifications.call.is_sent());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_incomplete_read_request_notifies_nobody() {
        let f = fixture(InMemoryBlobStore::new());
        put(&f, "a.jpg_to_en.txt", "hello").await;

        let requests = [
            ReadRequest {
                filename: None,
                ..ReadRequest::new("a.jpg", "en")
            },
            ReadRequest {
                lang: None,
                ..ReadRequest::new("a.jpg", "en")
            },
        ];
        for request in &requests {
            let err = f.stage.handle(request, &ctx()).await.unwrap_err();
            assert!(matches!(err, PipelineError::ValidationError(_)));
        }
        assert!(f.fakes.sms.sent().is_empty());
        assert_eq!(f.fakes.sms.attempts(), 0);
        assert!(f.fakes.call.placed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_stream_is_retryable() {
        let f = fixture(InMemoryBlobStore::new().with_chunk_size(2));
        put(&f, "a.jpg_to_en.txt", "hello").await;
        f.store.fail_next_streams(1);

        let err = f
            .stage
            .handle(&ReadRequest::new("a.jpg", "en"), &ctx())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(f.fakes.sms.sent().is_empty());
    }
}
