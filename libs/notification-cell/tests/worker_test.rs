use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use notification_cell::{
    backoff_delay_minutes, NotificationQueueService, NotificationRecord, NotificationStatus,
    NotificationWorkerService, PlannedNotification, WorkerConfig, NOTIFICATION_QUEUE_COLLECTION,
};
use shared_database::{DocumentStore, InMemoryStore};
use shared_utils::{Clock, FixedClock};
use whatsapp_cell::{MessageSender, SendError};

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

/// Delivery double: fails the first `failures` sends, then succeeds.
struct ScriptedSender {
    failures: Mutex<u32>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedSender {
    fn new(failures: u32) -> Self {
        Self {
            failures: Mutex::new(failures),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageSender for ScriptedSender {
    async fn send(&self, to_e164: &str, text: &str) -> Result<(), SendError> {
        self.calls
            .lock()
            .unwrap()
            .push((to_e164.to_string(), text.to_string()));
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(SendError::Delivery("gateway returned 503".to_string()));
        }
        Ok(())
    }
}

struct Harness {
    store: Arc<InMemoryStore>,
    clock: Arc<FixedClock>,
    queue: Arc<NotificationQueueService>,
    sender: Arc<ScriptedSender>,
    worker: NotificationWorkerService,
}

fn harness(failures: u32) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(at("2025-08-27T06:00:00Z")));
    let queue = Arc::new(NotificationQueueService::new(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        Arc::clone(&clock) as Arc<dyn shared_utils::Clock>,
    ));
    let sender = Arc::new(ScriptedSender::new(failures));
    let worker = NotificationWorkerService::new(
        WorkerConfig::default(),
        Arc::clone(&queue),
        Arc::clone(&sender) as Arc<dyn MessageSender>,
    );
    Harness { store, clock, queue, sender, worker }
}

async fn enqueue_due(h: &Harness) -> String {
    let planned = vec![PlannedNotification {
        kind: "created".to_string(),
        to: "+972541234567".to_string(),
        send_at: h.clock.now(),
        message_text: "שלום".to_string(),
    }];
    let stored = h.queue.enqueue_batch("appt-1", planned).await.unwrap();
    stored[0].id.clone()
}

async fn record(h: &Harness, id: &str) -> NotificationRecord {
    h.store
        .get(NOTIFICATION_QUEUE_COLLECTION, id)
        .await
        .unwrap()
        .unwrap()
        .parse()
        .unwrap()
}

#[test]
fn backoff_sequence_is_2_4_8_16_32() {
    let delays: Vec<i64> = (1..=5).map(backoff_delay_minutes).collect();
    assert_eq!(delays, vec![2, 4, 8, 16, 32]);
}

#[tokio::test]
async fn successful_delivery_marks_sent() {
    let h = harness(0);
    let id = enqueue_due(&h).await;

    h.worker.tick().await;

    let rec = record(&h, &id).await;
    assert_eq!(rec.status, NotificationStatus::Sent);
    assert_eq!(rec.sent_at, Some(h.clock.now()));
    assert_eq!(rec.locked_until, None);
    assert_eq!(h.sender.call_count(), 1);
}

#[tokio::test]
async fn failure_requeues_with_exponential_backoff() {
    let h = harness(1);
    let id = enqueue_due(&h).await;
    let t0 = h.clock.now();

    h.worker.tick().await;

    let rec = record(&h, &id).await;
    assert_eq!(rec.status, NotificationStatus::Queued);
    assert_eq!(rec.attempts, 1);
    assert_eq!(rec.send_at, t0 + Duration::minutes(2));
    assert_eq!(rec.locked_until, None);
    assert!(rec.error_message.as_deref().unwrap().contains("503"));

    // Not due again until the backoff elapses.
    h.clock.advance(Duration::minutes(1));
    h.worker.tick().await;
    assert_eq!(h.sender.call_count(), 1);

    h.clock.advance(Duration::minutes(1));
    h.worker.tick().await;
    let rec = record(&h, &id).await;
    assert_eq!(rec.status, NotificationStatus::Sent);
    assert_eq!(h.sender.call_count(), 2);
}

#[tokio::test]
async fn fifth_failure_is_terminal() {
    let h = harness(u32::MAX);
    let id = enqueue_due(&h).await;

    for expected_attempts in 1..=5u32 {
        h.worker.tick().await;
        let rec = record(&h, &id).await;
        assert_eq!(rec.attempts, expected_attempts);
        if expected_attempts < 5 {
            assert_eq!(rec.status, NotificationStatus::Queued);
            h.clock
                .advance(Duration::minutes(backoff_delay_minutes(expected_attempts)));
        } else {
            assert_eq!(rec.status, NotificationStatus::Error);
        }
    }

    // Terminal: never re-queued, never re-sent.
    h.clock.advance(Duration::hours(2));
    h.worker.tick().await;
    assert_eq!(h.sender.call_count(), 5);
    assert_eq!(record(&h, &id).await.status, NotificationStatus::Error);
}

#[tokio::test]
async fn future_send_times_are_not_picked_up() {
    let h = harness(0);
    let planned = vec![PlannedNotification {
        kind: "offset_-1_8:0".to_string(),
        to: "+972541234567".to_string(),
        send_at: h.clock.now() + Duration::hours(3),
        message_text: "תזכורת".to_string(),
    }];
    h.queue.enqueue_batch("appt-1", planned).await.unwrap();

    h.worker.tick().await;
    assert_eq!(h.sender.call_count(), 0);

    h.clock.advance(Duration::hours(3));
    h.worker.tick().await;
    assert_eq!(h.sender.call_count(), 1);
}

#[tokio::test]
async fn held_lease_skips_the_record() {
    let h = harness(0);
    let id = enqueue_due(&h).await;

    // Another worker instance holds the lease.
    h.store
        .update(
            NOTIFICATION_QUEUE_COLLECTION,
            &id,
            json!({ "lockedUntil": h.clock.now() + Duration::seconds(45) }),
        )
        .await
        .unwrap();

    h.worker.tick().await;
    assert_eq!(h.sender.call_count(), 0);
    assert_eq!(record(&h, &id).await.status, NotificationStatus::Queued);
}

#[tokio::test]
async fn expired_processing_lease_is_resurrected() {
    // A worker that crashed mid-claim leaves status=processing behind; the
    // record must become eligible again once its lease lapses.
    let h = harness(0);
    let id = enqueue_due(&h).await;
    h.store
        .update(
            NOTIFICATION_QUEUE_COLLECTION,
            &id,
            json!({
                "status": "processing",
                "lockedUntil": h.clock.now() - Duration::seconds(30),
            }),
        )
        .await
        .unwrap();

    h.worker.tick().await;

    let rec = record(&h, &id).await;
    assert_eq!(rec.status, NotificationStatus::Sent);
    assert_eq!(h.sender.call_count(), 1);
}

#[tokio::test]
async fn lost_claim_race_skips_delivery() {
    let h = harness(0);
    let id = enqueue_due(&h).await;

    // Fetch the due snapshot, then mutate the record underneath before the
    // worker claims it: the CAS on updatedAt must lose.
    let snapshot = h
        .store
        .get(NOTIFICATION_QUEUE_COLLECTION, &id)
        .await
        .unwrap()
        .unwrap();
    h.store
        .update(
            NOTIFICATION_QUEUE_COLLECTION,
            &id,
            json!({ "updatedAt": h.clock.now() + Duration::seconds(1) }),
        )
        .await
        .unwrap();

    let claimed = h.queue.claim(&snapshot, Duration::seconds(60)).await.unwrap();
    assert!(!claimed);
    assert_eq!(record(&h, &id).await.status, NotificationStatus::Queued);
}

#[tokio::test(start_paused = true)]
async fn hung_delivery_times_out_and_requeues() {
    struct HangingSender;

    #[async_trait]
    impl MessageSender for HangingSender {
        async fn send(&self, _to: &str, _text: &str) -> Result<(), SendError> {
            tokio::time::sleep(std::time::Duration::from_secs(600)).await;
            Ok(())
        }
    }

    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(at("2025-08-27T06:00:00Z")));
    let queue = Arc::new(NotificationQueueService::new(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        Arc::clone(&clock) as Arc<dyn shared_utils::Clock>,
    ));
    let worker = NotificationWorkerService::new(
        WorkerConfig::default(),
        Arc::clone(&queue),
        Arc::new(HangingSender),
    );

    let planned = vec![PlannedNotification {
        kind: "created".to_string(),
        to: "+972541234567".to_string(),
        send_at: at("2025-08-27T06:00:00Z"),
        message_text: "שלום".to_string(),
    }];
    let stored = queue.enqueue_batch("appt-1", planned).await.unwrap();
    let id = stored[0].id.clone();

    worker.tick().await;

    let rec: NotificationRecord = store
        .get(NOTIFICATION_QUEUE_COLLECTION, &id)
        .await
        .unwrap()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(rec.status, NotificationStatus::Queued);
    assert_eq!(rec.attempts, 1);
    assert!(rec.error_message.as_deref().unwrap().contains("timed out"));
}
