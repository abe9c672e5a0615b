//! Queue consumer for thumbnail generation
//!
//! Long-polls the work queue and runs the pipeline for every delivery. A
//! message is deleted only after its own pipeline run has stored the
//! derivative; failed items are left alone so the visibility timeout hands
//! them out again (or the queue's dead-letter policy takes over).

use futures::StreamExt;
use resilience::{wait_for_shutdown, with_retry, Backoff, RetryConfig, RetryError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::pipeline::ThumbnailPipeline;
use crate::clients::WorkQueue;
use crate::error::{ConsumerError, QueueError};
use crate::metrics;
use crate::models::QueueMessage;

/// Consumer configuration
#[derive(Clone, Debug)]
pub struct ConsumerConfig {
    /// Deliveries requested per poll
    pub max_messages: u32,
    /// Long-poll wait
    pub wait: Duration,
    /// Items processed concurrently from one poll
    pub concurrency: usize,
    /// Consecutive poll failures before the loop gives up
    pub poll_failure_limit: u32,
    pub poll_backoff: RetryConfig,
    pub ack_retry: RetryConfig,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_messages: 1,
            wait: Duration::from_secs(20),
            concurrency: 4,
            poll_failure_limit: 5,
            poll_backoff: RetryConfig {
                max_retries: u32::MAX,
                initial_backoff: Duration::from_secs(5),
                max_backoff: Duration::from_secs(60),
                backoff_multiplier: 2.0,
                jitter: true,
            },
            ack_retry: RetryConfig {
                max_retries: 2,
                initial_backoff: Duration::from_millis(200),
                max_backoff: Duration::from_secs(2),
                backoff_multiplier: 2.0,
                jitter: true,
            },
        }
    }
}

/// Counts for one poll's worth of deliveries
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub received: usize,
    pub acknowledged: usize,
    pub failed: usize,
    pub ack_failed: usize,
}

enum ItemOutcome {
    Acknowledged,
    AckFailed,
    Failed,
}

pub struct ThumbnailConsumer {
    queue: Arc<dyn WorkQueue>,
    pipeline: Arc<ThumbnailPipeline>,
    config: ConsumerConfig,
    shutdown_rx: watch::Receiver<bool>,
}

impl ThumbnailConsumer {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        pipeline: Arc<ThumbnailPipeline>,
        config: ConsumerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            pipeline,
            config,
            shutdown_rx,
        }
    }

    /// Run the consumer loop until shutdown.
    ///
    /// Shutdown interrupts a pending poll or poll backoff, never a batch: every
    /// delivery already received is processed and acknowledged first. Only a
    /// queue that stays unreachable for `poll_failure_limit` consecutive polls
    /// ends the loop with an error.
    pub async fn run(&self) -> Result<(), ConsumerError> {
        info!(
            max_messages = self.config.max_messages,
            wait_secs = self.config.wait.as_secs(),
            concurrency = self.config.concurrency,
            "Starting thumbnail consumer loop"
        );

        let mut shutdown = self.shutdown_rx.clone();
        let mut poll_backoff = Backoff::new(self.config.poll_backoff.clone());
        let mut consecutive_failures = 0u32;

        loop {
            if *shutdown.borrow() {
                info!("Shutdown signal received, stopping consumer");
                break;
            }

            let polled = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("Shutdown signal received, stopping consumer");
                    break;
                }
                polled = self.queue.poll(self.config.max_messages, self.config.wait) => polled,
            };

            match polled {
                Ok(messages) => {
                    consecutive_failures = 0;
                    poll_backoff.reset();

                    if messages.is_empty() {
                        debug!("No messages");
                        continue;
                    }

                    let report = self.process_batch(messages).await;
                    debug!(
                        received = report.received,
                        acknowledged = report.acknowledged,
                        failed = report.failed,
                        ack_failed = report.ack_failed,
                        "Batch processed"
                    );
                }
                Err(e) => {
                    consecutive_failures += 1;

                    if consecutive_failures >= self.config.poll_failure_limit {
                        error!(
                            failures = consecutive_failures,
                            error = %e,
                            "Queue unreachable, escalating"
                        );
                        return Err(ConsumerError::QueueUnavailable {
                            failures: consecutive_failures,
                            last_error: e,
                        });
                    }

                    let delay = poll_backoff.next_delay();
                    warn!(
                        failures = consecutive_failures,
                        limit = self.config.poll_failure_limit,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Queue poll failed, backing off"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = wait_for_shutdown(&mut shutdown) => {
                            info!("Shutdown signal received during backoff");
                            break;
                        }
                    }
                }
            }
        }

        info!("Thumbnail consumer stopped");
        Ok(())
    }

    /// Poll once and process whatever arrives
    pub async fn run_once(&self) -> Result<BatchReport, QueueError> {
        let messages = self
            .queue
            .poll(self.config.max_messages, self.config.wait)
            .await?;
        Ok(self.process_batch(messages).await)
    }

    /// Process deliveries through a bounded pool, acknowledging each one
    /// independently as soon as its own pipeline run succeeds.
    pub async fn process_batch(&self, messages: Vec<QueueMessage>) -> BatchReport {
        let mut report = BatchReport {
            received: messages.len(),
            ..Default::default()
        };

        let outcomes: Vec<ItemOutcome> = futures::stream::iter(messages)
            .map(|message| self.handle_message(message))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                ItemOutcome::Acknowledged => report.acknowledged += 1,
                ItemOutcome::AckFailed => report.ack_failed += 1,
                ItemOutcome::Failed => report.failed += 1,
            }
        }

        report
    }

    async fn handle_message(&self, message: QueueMessage) -> ItemOutcome {
        debug!(
            message_id = %message.message_id,
            receive_count = message.receive_count,
            "Received message"
        );

        match self.pipeline.process(&message).await {
            Ok(derivative) => {
                metrics::record_item_outcome("succeeded");
                debug!(
                    message_id = %message.message_id,
                    derivative_key = %derivative.target.key,
                    "Item complete, acknowledging"
                );
                self.acknowledge(&message).await
            }
            Err(e) => {
                metrics::record_item_outcome(e.kind());
                if e.is_retryable() {
                    warn!(
                        message_id = %message.message_id,
                        receive_count = message.receive_count,
                        error_kind = e.kind(),
                        error = %e,
                        "Item failed, leaving for redelivery"
                    );
                } else {
                    error!(
                        message_id = %message.message_id,
                        receive_count = message.receive_count,
                        error_kind = e.kind(),
                        error = %e,
                        "Item failed permanently, leaving for dead-letter redrive"
                    );
                }
                ItemOutcome::Failed
            }
        }
    }

    async fn acknowledge(&self, message: &QueueMessage) -> ItemOutcome {
        let token = message.delivery_token.as_str();

        // A stale delivery token stays stale; only an unreachable queue is retried
        let result = with_retry(self.config.ack_retry.clone(), || async move {
            match self.queue.delete(token).await {
                Err(QueueError::UnknownDeliveryToken(token)) => {
                    Ok(Err(QueueError::UnknownDeliveryToken(token)))
                }
                other => other.map(Ok),
            }
        })
        .await
        .map_err(RetryError::into_inner)
        .and_then(|deleted| deleted);

        match result {
            Ok(()) => ItemOutcome::Acknowledged,
            Err(e) => {
                metrics::record_ack_failure();
                warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Failed to acknowledge completed item, it will be reprocessed"
                );
                ItemOutcome::AckFailed
            }
        }
    }
}
