use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};

use shared_database::Stored;
use shared_models::AppError;

use crate::models::{
    Appointment, AppointmentError, CreateAppointmentRequest, ListAppointmentsQuery,
    UpdateAppointmentRequest,
};
use crate::services::BookingService;

#[derive(Clone)]
pub struct AppointmentCellState {
    pub booking: Arc<BookingService>,
}

pub async fn list_appointments(
    State(state): State<AppointmentCellState>,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<Json<Vec<Stored<Appointment>>>, AppError> {
    let appointments = state.booking.list(query).await.map_err(AppError::from)?;
    Ok(Json(appointments))
}

pub async fn create_appointment(
    State(state): State<AppointmentCellState>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Stored<Appointment>>), AppError> {
    let appointment = state.booking.create(request).await.map_err(AppError::from)?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn update_appointment(
    State(state): State<AppointmentCellState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Stored<Appointment>>, AppError> {
    let appointment = state.booking.reschedule(&id, request).await.map_err(AppError::from)?;
    Ok(Json(appointment))
}

pub async fn cancel_appointment(
    State(state): State<AppointmentCellState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.booking.cancel(&id).await.map_err(AppError::from)?;
    Ok(Json(json!({ "ok": true })))
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::InvalidConsultant => {
                AppError::InvalidConsultant("Consultant not found or inactive".to_string())
            }
            AppointmentError::Conflict(record) => AppError::Conflict {
                message: "Overlapping appointment".to_string(),
                conflict: serde_json::to_value(&record).unwrap_or(Value::Null),
            },
            AppointmentError::ValidationError(msg) => AppError::Validation(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
