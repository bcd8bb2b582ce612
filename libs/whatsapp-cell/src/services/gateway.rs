use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::{SendError, WhatsAppError};
use crate::models::ChannelStatus;

/// HTTP client for the external gateway process that owns the WhatsApp
/// session (pairing, QR, reconnects). This service never speaks the session
/// protocol itself.
pub struct WhatsAppGatewayClient {
    client: Client,
    base_url: String,
    token: String,
}

impl WhatsAppGatewayClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.whatsapp_gateway_url.trim_end_matches('/').to_string(),
            token: config.whatsapp_gateway_token.clone(),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !self.token.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    pub async fn status(&self) -> Result<ChannelStatus, WhatsAppError> {
        let url = format!("{}/status", self.base_url);
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| WhatsAppError::Gateway(e.to_string()))?;
        if !response.status().is_success() {
            return Err(WhatsAppError::Gateway(format!("status returned {}", response.status())));
        }
        let status = response
            .json::<ChannelStatus>()
            .await
            .unwrap_or(ChannelStatus::Unknown);
        Ok(status)
    }

    /// The latest pairing QR, if the gateway is waiting for a scan.
    pub async fn latest_qr(&self) -> Result<Option<String>, WhatsAppError> {
        let url = format!("{}/qr", self.base_url);
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| WhatsAppError::Gateway(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(WhatsAppError::Gateway(format!("qr returned {}", response.status())));
        }
        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| WhatsAppError::BadResponse(e.to_string()))?;
        Ok(payload.get("data").and_then(Value::as_str).map(String::from))
    }

    pub async fn logout(&self) -> Result<(), WhatsAppError> {
        let url = format!("{}/logout", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| WhatsAppError::Gateway(e.to_string()))?;
        if !response.status().is_success() {
            return Err(WhatsAppError::Gateway(format!("logout returned {}", response.status())));
        }
        Ok(())
    }
}

#[async_trait]
impl crate::services::sender::MessageSender for WhatsAppGatewayClient {
    async fn send(&self, to_e164: &str, text: &str) -> Result<(), SendError> {
        let url = format!("{}/send", self.base_url);
        debug!("Sending WhatsApp message to {}", to_e164);

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&json!({ "phone": to_e164, "message": text }))
            .send()
            .await
            .map_err(|e| SendError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("WhatsApp gateway rejected send ({}): {}", status, body);
            return Err(SendError::Delivery(format!("gateway returned {}: {}", status, body)));
        }
        Ok(())
    }
}
