use thiserror::Error;

/// Delivery failures surfaced by the messaging channel. The queue worker
/// treats every variant as retryable.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Channel unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum WhatsAppError {
    #[error("Gateway request failed: {0}")]
    Gateway(String),

    #[error("Unexpected gateway response: {0}")]
    BadResponse(String),
}
