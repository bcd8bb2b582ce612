use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::Stored;

pub const APPOINTMENTS_COLLECTION: &str = "appointments";

pub const DEFAULT_DURATION_MINUTES: i64 = 45;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A booked slot. `start`/`end` are absolute instants forming a half-open
/// interval, so back-to-back bookings never conflict. Cancellation flips
/// `status`; records are never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub consultant_id: String,
    pub client_name: String,
    pub client_phone: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub client_name: String,
    pub client_phone: String,
    pub consultant_id: String,
    /// Wall-clock or zoned timestamp string; normalized on intake.
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_phone: Option<String>,
    #[serde(default)]
    pub consultant_id: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAppointmentsQuery {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub consultant_id: Option<String>,
}

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Consultant not found or inactive")]
    InvalidConsultant,

    #[error("Overlapping appointment")]
    Conflict(Box<Stored<Appointment>>),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<shared_database::StoreError> for AppointmentError {
    fn from(e: shared_database::StoreError) -> Self {
        AppointmentError::DatabaseError(e.to_string())
    }
}

impl From<notification_cell::NotificationError> for AppointmentError {
    fn from(e: notification_cell::NotificationError) -> Self {
        AppointmentError::DatabaseError(e.to_string())
    }
}

impl From<shared_utils::TimeError> for AppointmentError {
    fn from(e: shared_utils::TimeError) -> Self {
        AppointmentError::ValidationError(e.to_string())
    }
}
