use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::models::ChannelStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberToken(u64);

/// Publish/subscribe registry for channel status and pairing QR pushes.
/// Subscribers hold an explicit token and must unsubscribe with it; the hub
/// also prunes subscribers whose receiver has been dropped. The latest status
/// and QR are retained so late subscribers catch up immediately.
pub struct StatusHub {
    subscribers: RwLock<HashMap<u64, mpsc::UnboundedSender<ChannelStatus>>>,
    next_token: AtomicU64,
    latest_status: RwLock<Option<ChannelStatus>>,
    latest_qr: RwLock<Option<String>>,
}

impl StatusHub {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_token: AtomicU64::new(0),
            latest_status: RwLock::new(None),
            latest_qr: RwLock::new(None),
        }
    }

    pub async fn subscribe(&self) -> (SubscriberToken, mpsc::UnboundedReceiver<ChannelStatus>) {
        let (sender, receiver) = mpsc::unbounded_channel();

        if let Some(status) = self.latest_status.read().await.clone() {
            let _ = sender.send(status);
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().await.insert(token, sender);
        debug!("Status subscriber {} registered", token);
        (SubscriberToken(token), receiver)
    }

    pub async fn unsubscribe(&self, token: SubscriberToken) {
        self.subscribers.write().await.remove(&token.0);
        debug!("Status subscriber {} removed", token.0);
    }

    pub async fn publish_status(&self, status: ChannelStatus) {
        *self.latest_status.write().await = Some(status.clone());

        let mut subscribers = self.subscribers.write().await;
        subscribers.retain(|_, sender| sender.send(status.clone()).is_ok());
    }

    pub async fn publish_qr(&self, qr: String) {
        *self.latest_qr.write().await = Some(qr);
    }

    pub async fn latest_status(&self) -> Option<ChannelStatus> {
        self.latest_status.read().await.clone()
    }

    pub async fn latest_qr(&self) -> Option<String> {
        self.latest_qr.read().await.clone()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

impl Default for StatusHub {
    fn default() -> Self {
        Self::new()
    }
}
