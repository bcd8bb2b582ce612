use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use shared_database::Stored;
use shared_models::AppError;

use crate::models::{
    Consultant, ConsultantError, CreateConsultantRequest, DeleteConsultantResponse,
    UpdateConsultantRequest,
};
use crate::services::ConsultantService;

#[derive(Clone)]
pub struct ConsultantCellState {
    pub service: Arc<ConsultantService>,
}

pub async fn list_consultants(
    State(state): State<ConsultantCellState>,
) -> Result<Json<Vec<Stored<Consultant>>>, AppError> {
    let consultants = state.service.list().await.map_err(AppError::from)?;
    Ok(Json(consultants))
}

pub async fn create_consultant(
    State(state): State<ConsultantCellState>,
    Json(request): Json<CreateConsultantRequest>,
) -> Result<(StatusCode, Json<Stored<Consultant>>), AppError> {
    let consultant = state.service.create(request).await.map_err(AppError::from)?;
    Ok((StatusCode::CREATED, Json(consultant)))
}

pub async fn update_consultant(
    State(state): State<ConsultantCellState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateConsultantRequest>,
) -> Result<Json<Stored<Consultant>>, AppError> {
    let consultant = state.service.update(&id, request).await.map_err(AppError::from)?;
    Ok(Json(consultant))
}

pub async fn delete_consultant(
    State(state): State<ConsultantCellState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteConsultantResponse>, AppError> {
    let outcome = state.service.delete(&id).await.map_err(AppError::from)?;
    Ok(Json(outcome))
}

impl From<ConsultantError> for AppError {
    fn from(e: ConsultantError) -> Self {
        match e {
            ConsultantError::NotFound => AppError::NotFound("Consultant not found".to_string()),
            ConsultantError::ValidationError(msg) => AppError::Validation(msg),
            ConsultantError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
