use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const NOTIFICATION_QUEUE_COLLECTION: &str = "notificationQueue";
pub const APP_CONFIG_COLLECTION: &str = "appConfig";
pub const SETTINGS_DOC_ID: &str = "settings";

/// Tag for reminders fired at creation time; offset reminders carry a
/// composite `offset_{days}_{hour}:{minute}` tag instead.
pub const KIND_CREATED: &str = "created";

fn default_true() -> bool {
    true
}

fn default_hour() -> u32 {
    8
}

// ==============================================================================
// QUEUE RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Queued,
    Processing,
    Sent,
    Error,
}

impl NotificationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NotificationStatus::Sent | NotificationStatus::Error)
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationStatus::Queued => write!(f, "queued"),
            NotificationStatus::Processing => write!(f, "processing"),
            NotificationStatus::Sent => write!(f, "sent"),
            NotificationStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub message_text: String,
}

/// One scheduled send. `lockedUntil` is the lease: while `processing`, the
/// record belongs to whichever worker holds an unexpired lease; once the
/// lease elapses it is eligible for re-claim even if still `processing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub appointment_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub to: String,
    pub send_at: DateTime<Utc>,
    pub payload: MessagePayload,
    pub status: NotificationStatus,
    pub attempts: u32,
    #[serde(default)]
    pub locked_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Evaluator output: one concrete send, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedNotification {
    pub kind: String,
    pub to: String,
    pub send_at: DateTime<Utc>,
    pub message_text: String,
}

// ==============================================================================
// REMINDER SETTINGS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRule {
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub immediate: bool,
    #[serde(default)]
    pub offset_days: i64,
    #[serde(default = "default_hour")]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    pub template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Placeholders {
    #[serde(default = "Placeholders::default_client_name")]
    pub client_name: String,
    #[serde(default = "Placeholders::default_consultant_name")]
    pub consultant_name: String,
    #[serde(default = "Placeholders::default_date_he")]
    pub date_he: String,
    #[serde(default = "Placeholders::default_time_he")]
    pub time_he: String,
}

impl Placeholders {
    fn default_client_name() -> String {
        "{שם}".to_string()
    }

    fn default_consultant_name() -> String {
        "{יועץ}".to_string()
    }

    fn default_date_he() -> String {
        "{תאריך}".to_string()
    }

    fn default_time_he() -> String {
        "{שעה}".to_string()
    }
}

impl Default for Placeholders {
    fn default() -> Self {
        Self {
            client_name: Self::default_client_name(),
            consultant_name: Self::default_consultant_name(),
            date_he: Self::default_date_he(),
            time_he: Self::default_time_he(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationSettings {
    pub reminders: Vec<ReminderRule>,
    #[serde(default)]
    pub placeholders: Placeholders,
}

impl NotificationSettings {
    /// The built-in rule set used whenever the settings document is absent
    /// or fails validation: immediate confirmation, day-before 08:00 and
    /// morning-of 08:00 reminders.
    pub fn default_settings() -> Self {
        Self {
            reminders: vec![
                ReminderRule {
                    active: true,
                    immediate: true,
                    offset_days: 0,
                    hour: 0,
                    minute: 0,
                    template: "שלום {שם}, נקבעה לך פגישה בתאריך {תאריך} בשעה {שעה} עם {יועץ}. אם אינך יכול/ה להגיע אנא עדכן/ני.".to_string(),
                },
                ReminderRule {
                    active: true,
                    immediate: false,
                    offset_days: -1,
                    hour: 8,
                    minute: 0,
                    template: "תזכורת: מחר בשעה {שעה} יש לך פגישה עם {יועץ}. נתראה!".to_string(),
                },
                ReminderRule {
                    active: true,
                    immediate: false,
                    offset_days: 0,
                    hour: 8,
                    minute: 0,
                    template: "בוקר טוב! היום בשעה {שעה} נקבעה פגישה עם {יועץ}. בהצלחה!".to_string(),
                },
            ],
            placeholders: Placeholders::default(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.reminders.is_empty() {
            return Err("at least one reminder rule is required".to_string());
        }
        for (i, rule) in self.reminders.iter().enumerate() {
            if rule.hour > 23 {
                return Err(format!("reminder {}: hour must be 0-23", i));
            }
            if rule.minute > 59 {
                return Err(format!("reminder {}: minute must be 0-59", i));
            }
            if rule.template.trim().is_empty() {
                return Err(format!("reminder {}: template must not be empty", i));
            }
        }
        Ok(())
    }
}

// ==============================================================================
// WORKER CONFIGURATION
// ==============================================================================

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub tick_seconds: u64,
    pub batch_size: usize,
    pub lease_seconds: i64,
    pub max_attempts: u32,
    pub send_timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 30,
            batch_size: 10,
            lease_seconds: 60,
            max_attempts: 5,
            // Strictly shorter than the lease so a hung delivery cannot
            // outlive its claim unnoticed.
            send_timeout_seconds: 30,
        }
    }
}
