use std::sync::Arc;

use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, instrument, warn};

use shared_database::Document;
use whatsapp_cell::MessageSender;

use crate::error::NotificationError;
use crate::models::{NotificationRecord, NotificationStatus, WorkerConfig};
use crate::services::queue::NotificationQueueService;

/// Periodic polling worker: each tick it leases due queue records, attempts
/// delivery once per record, and applies the success/failure transition.
/// Runs detached from the request path.
pub struct NotificationWorkerService {
    config: WorkerConfig,
    queue: Arc<NotificationQueueService>,
    sender: Arc<dyn MessageSender>,
    is_shutdown: tokio::sync::RwLock<bool>,
}

impl NotificationWorkerService {
    pub fn new(
        config: WorkerConfig,
        queue: Arc<NotificationQueueService>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self {
            config,
            queue,
            sender,
            is_shutdown: tokio::sync::RwLock::new(false),
        }
    }

    #[instrument(skip(self))]
    pub async fn start(&self) {
        info!("Starting notification worker (tick every {}s)", self.config.tick_seconds);
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.tick_seconds));
        loop {
            interval.tick().await;
            if *self.is_shutdown.read().await {
                info!("Notification worker stopping");
                break;
            }
            self.tick().await;
        }
    }

    pub async fn shutdown(&self) {
        let mut is_shutdown = self.is_shutdown.write().await;
        *is_shutdown = true;
    }

    /// One polling cycle. A failed due-query (e.g. a missing index) is logged
    /// and the tick skipped; the worker itself never dies.
    pub async fn tick(&self) {
        let due = match self.queue.due_records(self.config.batch_size).await {
            Ok(due) => due,
            Err(e) => {
                error!("Queue scan error (likely missing index), skipping tick: {}", e);
                return;
            }
        };
        if due.is_empty() {
            return;
        }
        debug!("Worker tick: {} due notification(s)", due.len());

        for candidate in due {
            let id = candidate.id.clone();
            if let Err(e) = self.process_record(candidate).await {
                error!("Failed to process notification {}: {}", id, e);
            }
        }
    }

    async fn process_record(&self, candidate: Document) -> Result<(), NotificationError> {
        let record: NotificationRecord = candidate.parse()?;

        let lease = chrono::Duration::seconds(self.config.lease_seconds);
        if !self.queue.claim(&candidate, lease).await? {
            return Ok(());
        }

        let send = self.sender.send(&record.to, &record.payload.message_text);
        let outcome = timeout(Duration::from_secs(self.config.send_timeout_seconds), send).await;

        match outcome {
            Ok(Ok(())) => {
                self.queue.mark_sent(&candidate.id).await?;
                info!("Notification {} sent to {}", candidate.id, record.to);
            }
            Ok(Err(e)) => {
                self.fail(&candidate.id, record.attempts, &e.to_string()).await?;
            }
            Err(_) => {
                let message = format!(
                    "delivery timed out after {}s",
                    self.config.send_timeout_seconds
                );
                self.fail(&candidate.id, record.attempts, &message).await?;
            }
        }
        Ok(())
    }

    async fn fail(
        &self,
        id: &str,
        previous_attempts: u32,
        message: &str,
    ) -> Result<(), NotificationError> {
        let status = self
            .queue
            .mark_failed(id, previous_attempts, message, self.config.max_attempts)
            .await?;
        match status {
            NotificationStatus::Error => {
                error!("Notification {} failed permanently: {}", id, message);
            }
            _ => {
                warn!(
                    "Notification {} failed (attempt {}), requeued: {}",
                    id,
                    previous_attempts + 1,
                    message
                );
            }
        }
        Ok(())
    }
}
