//! # Worker Runtime
//!
//! Pulls job messages from a [`JobQueue`] and settles each one according to
//! the orchestrator's outcome:
//!
//! | outcome                                  | queue action  |
//! |------------------------------------------|---------------|
//! | success                                  | `complete`    |
//! | malformed message                        | `dead_letter` |
//! | transient failure, deliveries remaining  | `abandon`     |
//! | transient failure, deliveries exhausted  | `dead_letter` |
//!
//! Each slot is a spawned task that processes one message to completion
//! before taking the next. Slots share only the orchestrator, which holds no
//! per-job state.

use crate::constants::operations;
use crate::logging::log_error;
use crate::messaging::{JobQueue, QueueMessage, QueueResult};
use crate::orchestration::JobOrchestrator;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// How a single received message was settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// The queue had no visible message
    Idle,
    Completed { message_id: String, run_id: String },
    Redelivered { message_id: String, error_code: String },
    DeadLettered { message_id: String, reason: String },
}

#[derive(Clone)]
pub struct WorkerRuntime {
    orchestrator: Arc<JobOrchestrator>,
    queue: Arc<dyn JobQueue>,
    max_delivery_count: u32,
    poll_interval: Duration,
    concurrency: usize,
}

impl WorkerRuntime {
    pub fn new(orchestrator: Arc<JobOrchestrator>, queue: Arc<dyn JobQueue>) -> Self {
        let queue_config = &orchestrator.config().queue;
        Self {
            max_delivery_count: queue_config.max_delivery_count.max(1),
            poll_interval: queue_config.poll_interval(),
            concurrency: queue_config.concurrency.max(1),
            orchestrator,
            queue,
        }
    }

    pub fn orchestrator(&self) -> &JobOrchestrator {
        &self.orchestrator
    }

    /// Receive, process and settle at most one message
    pub async fn process_next(&self) -> QueueResult<MessageOutcome> {
        let Some(message) = self.queue.receive().await? else {
            return Ok(MessageOutcome::Idle);
        };

        match self.orchestrator.process_message(&message.body).await {
            Ok(report) => {
                self.queue.complete(&message).await?;
                Ok(MessageOutcome::Completed {
                    message_id: message.id,
                    run_id: report.run_id,
                })
            }
            Err(e) if e.is_poison() => {
                let reason = format!("{}: {e}", e.error_code());
                self.dead_letter(&message, reason).await
            }
            Err(e) if message.dequeue_count >= self.max_delivery_count => {
                let reason = format!(
                    "MAX_DELIVERY_COUNT_EXCEEDED after {} deliveries: {}: {e}",
                    message.dequeue_count,
                    e.error_code()
                );
                self.dead_letter(&message, reason).await
            }
            Err(e) => {
                self.queue.abandon(&message).await?;
                warn!(
                    operation = operations::MESSAGE_ABANDONED,
                    message_id = %message.id,
                    dequeue_count = message.dequeue_count,
                    max_delivery_count = self.max_delivery_count,
                    error_code = e.error_code(),
                    "Message returned to queue for redelivery"
                );
                Ok(MessageOutcome::Redelivered {
                    message_id: message.id,
                    error_code: e.error_code().to_string(),
                })
            }
        }
    }

    async fn dead_letter(&self, message: &QueueMessage, reason: String) -> QueueResult<MessageOutcome> {
        self.queue.dead_letter(message, &reason).await?;
        error!(
            operation = operations::MESSAGE_DEAD_LETTERED,
            message_id = %message.id,
            dequeue_count = message.dequeue_count,
            reason = %reason,
            "Message moved to dead-letter"
        );
        Ok(MessageOutcome::DeadLettered {
            message_id: message.id.clone(),
            reason,
        })
    }

    /// Process messages until the queue reports no visible message
    pub async fn drain(&self) -> QueueResult<Vec<MessageOutcome>> {
        let mut outcomes = Vec::new();
        loop {
            match self.process_next().await? {
                MessageOutcome::Idle => return Ok(outcomes),
                outcome => outcomes.push(outcome),
            }
        }
    }

    /// Run all slots until `shutdown` resolves. Each slot is its own task;
    /// in-progress jobs finish before their slot exits. A failed shutdown
    /// listener stops the slots the same way and its error is returned.
    pub async fn run_until<F, E>(&self, shutdown: F) -> Result<(), E>
    where
        F: Future<Output = Result<(), E>> + Send,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        info!(
            concurrency = self.concurrency,
            max_delivery_count = self.max_delivery_count,
            "Worker runtime started"
        );

        let handles: Vec<_> = (0..self.concurrency)
            .map(|slot| {
                let runtime = self.clone();
                let stop = stop_rx.clone();
                tokio::spawn(async move { runtime.run_slot(slot, stop).await })
            })
            .collect();

        let outcome = shutdown.await;
        info!(
            listener_failed = outcome.is_err(),
            "Shutdown requested; finishing in-flight jobs"
        );
        let _ = stop_tx.send(true);

        for (slot, joined) in futures::future::join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = joined {
                log_error(
                    "worker_runtime",
                    "run_slot",
                    &e.to_string(),
                    Some(&format!("slot={slot}")),
                );
            }
        }
        info!("Worker runtime stopped");
        outcome
    }

    async fn run_slot(&self, slot: usize, mut stop: watch::Receiver<bool>) {
        while !*stop.borrow() {
            let idle = match self.process_next().await {
                Ok(MessageOutcome::Idle) => true,
                Ok(_) => false,
                Err(e) => {
                    log_error(
                        "worker_runtime",
                        "process_next",
                        &e.to_string(),
                        Some(&format!("slot={slot}")),
                    );
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = stop.changed() => {}
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }
    }
}
