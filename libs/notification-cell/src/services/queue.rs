use std::sync::Arc;

use chrono::Duration;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_database::{Document, DocumentStore, Predicate, Stored};
use shared_utils::Clock;

use crate::error::NotificationError;
use crate::models::{
    MessagePayload, NotificationRecord, NotificationStatus, PlannedNotification,
    NOTIFICATION_QUEUE_COLLECTION,
};

/// Backoff before retry number `attempts`: 2, 4, 8, 16, 32 minutes.
pub fn backoff_delay_minutes(attempts: u32) -> i64 {
    2i64.pow(attempts)
}

/// Durable queue of scheduled sends. All state transitions happen here; the
/// worker only decides which transition to apply.
pub struct NotificationQueueService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl NotificationQueueService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Persist one queued record per planned notification.
    pub async fn enqueue_batch(
        &self,
        appointment_id: &str,
        planned: Vec<PlannedNotification>,
    ) -> Result<Vec<Stored<NotificationRecord>>, NotificationError> {
        let now = self.clock.now();
        let mut stored = Vec::with_capacity(planned.len());

        for item in planned {
            let record = NotificationRecord {
                appointment_id: appointment_id.to_string(),
                kind: item.kind,
                to: item.to,
                send_at: item.send_at,
                payload: MessagePayload { message_text: item.message_text },
                status: NotificationStatus::Queued,
                attempts: 0,
                locked_until: None,
                error_message: None,
                sent_at: None,
                created_at: now,
                updated_at: now,
            };
            let data = serde_json::to_value(&record)
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;
            let id = self.store.add(NOTIFICATION_QUEUE_COLLECTION, data).await?;
            stored.push(Stored { id, data: record });
        }

        info!(
            "Enqueued {} notifications for appointment {}",
            stored.len(),
            appointment_id
        );
        Ok(stored)
    }

    /// Flip every live (`queued`/`processing`) record of an appointment to
    /// terminal `error` in one batch, preserving the audit trail. Used on
    /// reschedule and cancel so stale reminders never fire.
    pub async fn supersede_for_appointment(
        &self,
        appointment_id: &str,
        reason: &str,
    ) -> Result<usize, NotificationError> {
        let live = self
            .store
            .query(
                NOTIFICATION_QUEUE_COLLECTION,
                &[
                    Predicate::eq("appointmentId", appointment_id),
                    Predicate::is_in("status", vec![json!("queued"), json!("processing")]),
                ],
                None,
            )
            .await?;
        if live.is_empty() {
            return Ok(0);
        }

        let now = self.clock.now();
        let updates = live
            .iter()
            .map(|doc| {
                (
                    NOTIFICATION_QUEUE_COLLECTION.to_string(),
                    doc.id.clone(),
                    json!({
                        "status": "error",
                        "errorMessage": reason,
                        "lockedUntil": null,
                        "updatedAt": now,
                    }),
                )
            })
            .collect();
        self.store.batch_update(updates).await?;

        info!(
            "Superseded {} notifications for appointment {} ({})",
            live.len(),
            appointment_id,
            reason
        );
        Ok(live.len())
    }

    pub async fn records_for_appointment(
        &self,
        appointment_id: &str,
    ) -> Result<Vec<Stored<NotificationRecord>>, NotificationError> {
        let docs = self
            .store
            .query(
                NOTIFICATION_QUEUE_COLLECTION,
                &[Predicate::eq("appointmentId", appointment_id)],
                None,
            )
            .await?;
        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            let data: NotificationRecord = doc.parse()?;
            records.push(Stored { id: doc.id, data });
        }
        Ok(records)
    }

    /// The due-set for one tick: records ready to send, plus `processing`
    /// records whose lease has expired (a crashed claim must not strand work).
    pub async fn due_records(&self, batch_size: usize) -> Result<Vec<Document>, NotificationError> {
        let now = serde_json::to_value(self.clock.now())
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        let mut due = self
            .store
            .query(
                NOTIFICATION_QUEUE_COLLECTION,
                &[
                    Predicate::eq("status", "queued"),
                    Predicate::Lte("sendAt".to_string(), now.clone()),
                ],
                Some(batch_size),
            )
            .await?;

        let expired_leases = self
            .store
            .query(
                NOTIFICATION_QUEUE_COLLECTION,
                &[
                    Predicate::eq("status", "processing"),
                    Predicate::Lte("lockedUntil".to_string(), now),
                ],
                Some(batch_size),
            )
            .await?;
        for doc in expired_leases {
            if !due.iter().any(|d| d.id == doc.id) {
                due.push(doc);
            }
        }

        Ok(due)
    }

    /// Try to lease a due record. The compare-and-set is keyed on the
    /// `updatedAt` snapshot, so at most one claimant wins and a record that
    /// changed since it was read is skipped this tick.
    pub async fn claim(
        &self,
        candidate: &Document,
        lease: Duration,
    ) -> Result<bool, NotificationError> {
        let record: NotificationRecord = candidate.parse()?;
        let now = self.clock.now();

        if let Some(locked_until) = record.locked_until {
            if locked_until > now {
                debug!("Notification {} lease held until {}", candidate.id, locked_until);
                return Ok(false);
            }
        }

        let snapshot_updated_at = match candidate.data.get("updatedAt") {
            Some(v) => v.clone(),
            None => Value::Null,
        };
        let claimed = self
            .store
            .guarded_update(
                NOTIFICATION_QUEUE_COLLECTION,
                &candidate.id,
                &[Predicate::Eq("updatedAt".to_string(), snapshot_updated_at)],
                json!({
                    "status": "processing",
                    "lockedUntil": now + lease,
                    "updatedAt": now,
                }),
            )
            .await?;
        if !claimed {
            debug!("Notification {} claim lost", candidate.id);
        }
        Ok(claimed)
    }

    pub async fn mark_sent(&self, id: &str) -> Result<(), NotificationError> {
        let now = self.clock.now();
        self.store
            .update(
                NOTIFICATION_QUEUE_COLLECTION,
                id,
                json!({
                    "status": "sent",
                    "sentAt": now,
                    "lockedUntil": null,
                    "updatedAt": now,
                }),
            )
            .await?;
        Ok(())
    }

    /// Record a delivery failure: bump attempts, push `sendAt` out by the
    /// exponential backoff, release the lease, and finalize as `error` once
    /// the attempt cap is reached.
    pub async fn mark_failed(
        &self,
        id: &str,
        previous_attempts: u32,
        error_message: &str,
        max_attempts: u32,
    ) -> Result<NotificationStatus, NotificationError> {
        let attempts = previous_attempts + 1;
        let now = self.clock.now();
        let next_send = now + Duration::minutes(backoff_delay_minutes(attempts));
        let status = if attempts >= max_attempts {
            NotificationStatus::Error
        } else {
            NotificationStatus::Queued
        };

        self.store
            .update(
                NOTIFICATION_QUEUE_COLLECTION,
                id,
                json!({
                    "status": status.to_string(),
                    "attempts": attempts,
                    "errorMessage": error_message,
                    "sendAt": next_send,
                    "lockedUntil": null,
                    "updatedAt": now,
                }),
            )
            .await?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let delays: Vec<i64> = (1..=5).map(backoff_delay_minutes).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 32]);
    }
}
