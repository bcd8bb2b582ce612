use std::env;
use std::str::FromStr;

use chrono_tz::Tz;
use tracing::warn;

/// All times entered without an explicit offset are interpreted in this zone,
/// and reminder texts render dates/times in it.
pub const DEFAULT_TIMEZONE: &str = "Asia/Jerusalem";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub firestore_project_id: String,
    pub firestore_base_url: String,
    pub firestore_auth_token: Option<String>,
    pub whatsapp_gateway_url: String,
    pub whatsapp_gateway_token: String,
    pub reference_timezone: Tz,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            firestore_project_id: env::var("FIRESTORE_PROJECT_ID")
                .unwrap_or_else(|_| {
                    warn!("FIRESTORE_PROJECT_ID not set, using empty value");
                    String::new()
                }),
            firestore_base_url: env::var("FIRESTORE_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("FIRESTORE_BASE_URL not set, using default");
                    "https://firestore.googleapis.com/v1".to_string()
                }),
            firestore_auth_token: env::var("FIRESTORE_AUTH_TOKEN").ok(),
            whatsapp_gateway_url: env::var("WHATSAPP_GATEWAY_URL")
                .unwrap_or_else(|_| {
                    warn!("WHATSAPP_GATEWAY_URL not set, using empty value");
                    String::new()
                }),
            whatsapp_gateway_token: env::var("WHATSAPP_GATEWAY_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("WHATSAPP_GATEWAY_TOKEN not set, using empty value");
                    String::new()
                }),
            reference_timezone: Self::timezone_from_env(),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5001),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    fn timezone_from_env() -> Tz {
        let name = env::var("REFERENCE_TIMEZONE").unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string());
        Tz::from_str(&name).unwrap_or_else(|_| {
            warn!("REFERENCE_TIMEZONE '{}' is not a valid IANA zone, using {}", name, DEFAULT_TIMEZONE);
            chrono_tz::Asia::Jerusalem
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.firestore_project_id.is_empty() && !self.whatsapp_gateway_url.is_empty()
    }
}
