pub mod gateway;
pub mod sender;
pub mod status;

pub use gateway::WhatsAppGatewayClient;
pub use sender::MessageSender;
pub use status::{StatusHub, SubscriberToken};
