use std::sync::Arc;

use axum::{extract::State, response::Json};

use shared_models::AppError;

use crate::error::NotificationError;
use crate::models::NotificationSettings;
use crate::services::SettingsService;

#[derive(Clone)]
pub struct NotificationCellState {
    pub settings: Arc<SettingsService>,
}

pub async fn get_settings(
    State(state): State<NotificationCellState>,
) -> Result<Json<NotificationSettings>, AppError> {
    Ok(Json(state.settings.get_settings().await))
}

pub async fn put_settings(
    State(state): State<NotificationCellState>,
    Json(settings): Json<NotificationSettings>,
) -> Result<Json<NotificationSettings>, AppError> {
    let saved = state.settings.save_settings(settings).await.map_err(AppError::from)?;
    Ok(Json(saved))
}

impl From<NotificationError> for AppError {
    fn from(e: NotificationError) -> Self {
        match e {
            NotificationError::ValidationError(msg) => AppError::Validation(msg),
            NotificationError::DatabaseError(msg) => AppError::Database(msg),
            NotificationError::NotFound(msg) => AppError::NotFound(msg),
        }
    }
}
