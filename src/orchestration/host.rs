//! # Pipeline Host
//!
//! Pulls deliveries for every subscribed topic, runs each through the
//! pipeline under the stage timeout, and settles it with the bus:
//!
//! - success: ack
//! - permanent failure (validation, undecodable payload): ack and drop
//! - transient failure: nack, so the bus redelivers
//! - transient failure on the last allowed attempt: ack and dead-letter

use crate::config::HostConfig;
use crate::error::{ErrorDisposition, PipelineError, PipelineResult};
use crate::logging::log_error;
use crate::messaging::{Delivery, MessageSubscriber};
use crate::orchestration::bootstrap::Pipeline;
use crate::stages::InvocationContext;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How a delivery was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryDisposition {
    Acked,
    Dropped,
    Redelivered,
    DeadLettered,
}

/// Running totals of settled deliveries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostStats {
    pub received: usize,
    pub acked: usize,
    pub dropped: usize,
    pub redelivered: usize,
    pub dead_lettered: usize,
}

impl HostStats {
    pub fn record(&mut self, disposition: DeliveryDisposition) {
        self.received += 1;
        match disposition {
            DeliveryDisposition::Acked => self.acked += 1,
            DeliveryDisposition::Dropped => self.dropped += 1,
            DeliveryDisposition::Redelivered => self.redelivered += 1,
            DeliveryDisposition::DeadLettered => self.dead_lettered += 1,
        }
    }

    pub fn merge(&mut self, other: &HostStats) {
        self.received += other.received;
        self.acked += other.acked;
        self.dropped += other.dropped;
        self.redelivered += other.redelivered;
        self.dead_lettered += other.dead_lettered;
    }
}

pub struct PipelineHost {
    pipeline: Arc<Pipeline>,
    subscriber: Arc<dyn MessageSubscriber>,
    config: HostConfig,
}

impl std::fmt::Debug for PipelineHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHost")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PipelineHost {
    pub fn new(pipeline: Arc<Pipeline>, subscriber: Arc<dyn MessageSubscriber>) -> Self {
        let config = pipeline.config().host.clone();
        Self {
            pipeline,
            subscriber,
            config,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Receive one batch per topic and settle every delivery in it
    pub async fn process_available(&self) -> PipelineResult<HostStats> {
        let mut batches = Vec::new();
        for topic in self.pipeline.subscribed_topics() {
            let deliveries = self
                .subscriber
                .receive(topic, self.config.batch_size, self.config.visibility_timeout())
                .await?;
            batches.extend(deliveries.into_iter().map(|delivery| (topic, delivery)));
        }

        let dispositions = join_all(
            batches
                .into_iter()
                .map(|(topic, delivery)| self.process_delivery(topic, delivery)),
        )
        .await;

        let mut stats = HostStats::default();
        for disposition in dispositions {
            stats.record(disposition);
        }
        Ok(stats)
    }

    /// Unsettled messages across all subscribed topics, including delayed ones
    pub async fn pending(&self) -> PipelineResult<usize> {
        let mut pending = 0;
        for topic in self.pipeline.subscribed_topics() {
            pending += self.subscriber.topic_metrics(topic).await?.pending();
        }
        Ok(pending)
    }

    /// Keep processing until every subscribed topic is empty. Waits out
    /// delayed messages by polling. Fails with a timeout after `max_rounds`
    /// receive rounds.
    pub async fn run_until_idle(&self, max_rounds: usize) -> PipelineResult<HostStats> {
        let mut totals = HostStats::default();
        for _ in 0..max_rounds {
            let round = self.process_available().await?;
            totals.merge(&round);
            if round.received > 0 {
                continue;
            }
            if self.pending().await? == 0 {
                debug!(?totals, "Pipeline idle");
                return Ok(totals);
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        Err(PipelineError::Timeout(format!(
            "pipeline still had pending messages after {max_rounds} rounds"
        )))
    }

    /// Poll until `shutdown` flips to true or its sender is dropped
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> HostStats {
        info!(topics = ?self.pipeline.subscribed_topics(), "🚀 HOST: Starting delivery loop");
        let mut totals = HostStats::default();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = match self.process_available().await {
                Ok(round) => {
                    totals.merge(&round);
                    round.received
                }
                Err(err) => {
                    log_error("host", "process_available", &err.to_string(), None);
                    0
                }
            };
            if received > 0 {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(?totals, "🛑 HOST: Delivery loop stopped");
        totals
    }

    /// Run the delivery loop on a background task
    pub fn spawn(self: Arc<Self>) -> PipelineHostHandle {
        let (shutdown_sender, shutdown) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(shutdown).await });
        PipelineHostHandle {
            shutdown_sender,
            task,
        }
    }

    async fn process_delivery(&self, topic: &str, delivery: Delivery) -> DeliveryDisposition {
        let ctx = InvocationContext::new(
            delivery.delivery_id.clone(),
            delivery.attempt,
            self.config.stage_timeout(),
        );

        let result = match tokio::time::timeout(
            self.config.stage_timeout(),
            self.pipeline.dispatch(topic, &delivery.message, &ctx),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(format!(
                "{topic} handler exceeded {}ms",
                self.config.stage_timeout_ms
            ))),
        };

        let disposition = match result {
            Ok(Some(outcome)) => {
                debug!(
                    topic = %topic,
                    stage = %outcome.stage(),
                    message_id = %delivery.message.message_id,
                    ?outcome,
                    "Delivery handled"
                );
                DeliveryDisposition::Acked
            }
            Ok(None) => {
                warn!(topic = %topic, "No stage consumes this topic, dropping delivery");
                DeliveryDisposition::Dropped
            }
            Err(err) => self.classify_failure(topic, &delivery, &err),
        };

        let settled = match disposition {
            DeliveryDisposition::Redelivered => {
                self.subscriber.nack(topic, &delivery.delivery_id).await
            }
            _ => self.subscriber.ack(topic, &delivery.delivery_id).await,
        };
        if let Err(err) = settled {
            // The claim lapses and the bus redelivers on its own
            log_error(
                "host",
                "settle_delivery",
                &err.to_string(),
                Some(&delivery.delivery_id),
            );
        }

        disposition
    }

    fn classify_failure(
        &self,
        topic: &str,
        delivery: &Delivery,
        err: &PipelineError,
    ) -> DeliveryDisposition {
        match err.disposition() {
            ErrorDisposition::Drop => {
                warn!(
                    topic = %topic,
                    message_id = %delivery.message.message_id,
                    category = err.category(),
                    error = %err,
                    "Dropping delivery after permanent failure"
                );
                DeliveryDisposition::Dropped
            }
            ErrorDisposition::Redeliver if delivery.attempt >= self.config.max_delivery_attempts => {
                error!(
                    topic = %topic,
                    message_id = %delivery.message.message_id,
                    attempt = delivery.attempt,
                    category = err.category(),
                    error = %err,
                    "Dead-lettering delivery after exhausting attempts"
                );
                DeliveryDisposition::DeadLettered
            }
            ErrorDisposition::Redeliver => {
                warn!(
                    topic = %topic,
                    message_id = %delivery.message.message_id,
                    attempt = delivery.attempt,
                    category = err.category(),
                    error = %err,
                    "Handing delivery back for redelivery"
                );
                DeliveryDisposition::Redelivered
            }
        }
    }
}

/// Handle to a host running on a background task
#[derive(Debug)]
pub struct PipelineHostHandle {
    shutdown_sender: watch::Sender<bool>,
    task: JoinHandle<HostStats>,
}

impl PipelineHostHandle {
    /// Signal shutdown and wait for the loop to finish its current round
    pub async fn stop(self) -> PipelineResult<HostStats> {
        // Err only if the loop already exited and dropped its receiver
        let _ = self.shutdown_sender.send(true);
        self.task
            .await
            .map_err(|e| PipelineError::Timeout(format!("host task did not stop cleanly: {e}")))
    }
}
