use async_trait::async_trait;

use crate::error::SendError;

/// The single contract the notification engine has with the messaging
/// channel: deliver one text to one E.164 recipient.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, to_e164: &str, text: &str) -> Result<(), SendError>;
}
