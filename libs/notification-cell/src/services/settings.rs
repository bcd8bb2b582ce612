use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use shared_database::DocumentStore;
use shared_utils::Clock;

use crate::error::NotificationError;
use crate::models::{
    NotificationSettings, Placeholders, APP_CONFIG_COLLECTION, SETTINGS_DOC_ID,
};

const CACHE_TTL_SECONDS: i64 = 10;

/// Values substituted into a reminder template.
#[derive(Debug, Clone)]
pub struct TemplateTokens {
    pub client_name: String,
    pub consultant_name: String,
    pub date_he: String,
    pub time_he: String,
}

pub fn render_template(template: &str, placeholders: &Placeholders, tokens: &TemplateTokens) -> String {
    template
        .replace(&placeholders.client_name, &tokens.client_name)
        .replace(&placeholders.consultant_name, &tokens.consultant_name)
        .replace(&placeholders.date_he, &tokens.date_he)
        .replace(&placeholders.time_he, &tokens.time_he)
}

struct CachedSettings {
    value: NotificationSettings,
    expiry: DateTime<Utc>,
}

/// Settings live in a singleton document and change rarely; reads go through
/// a short-TTL process-local cache. Staleness across instances is accepted.
pub struct SettingsService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    cache: RwLock<Option<CachedSettings>>,
    ttl: Duration,
}

impl SettingsService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            cache: RwLock::new(None),
            ttl: Duration::seconds(CACHE_TTL_SECONDS),
        }
    }

    /// Current settings, falling back to the built-in defaults when the
    /// document is absent, unreadable or invalid.
    pub async fn get_settings(&self) -> NotificationSettings {
        let now = self.clock.now();
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expiry > now {
                    return cached.value.clone();
                }
            }
        }

        let settings = self.load().await;
        *self.cache.write().await = Some(CachedSettings {
            value: settings.clone(),
            expiry: now + self.ttl,
        });
        settings
    }

    async fn load(&self) -> NotificationSettings {
        match self.store.get(APP_CONFIG_COLLECTION, SETTINGS_DOC_ID).await {
            Ok(Some(doc)) => match doc.parse::<NotificationSettings>() {
                Ok(settings) if settings.validate().is_ok() => settings,
                Ok(_) | Err(_) => {
                    warn!("Stored settings are invalid, using defaults");
                    NotificationSettings::default_settings()
                }
            },
            Ok(None) => {
                debug!("No settings document, using defaults");
                NotificationSettings::default_settings()
            }
            Err(e) => {
                warn!("Failed to read settings, using defaults: {}", e);
                NotificationSettings::default_settings()
            }
        }
    }

    pub async fn save_settings(
        &self,
        settings: NotificationSettings,
    ) -> Result<NotificationSettings, NotificationError> {
        settings
            .validate()
            .map_err(NotificationError::ValidationError)?;

        let data = serde_json::to_value(&settings)
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;
        self.store
            .set(APP_CONFIG_COLLECTION, SETTINGS_DOC_ID, data)
            .await?;

        *self.cache.write().await = Some(CachedSettings {
            value: settings.clone(),
            expiry: self.clock.now() + self.ttl,
        });
        Ok(settings)
    }
}
