use serde::{Deserialize, Serialize};

/// Connection state of the external WhatsApp session gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelStatus {
    Authenticated,
    Ready,
    Disconnected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    AuthFailure {
        message: String,
    },
    Unknown,
}

impl ChannelStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ChannelStatus::Ready)
    }
}
