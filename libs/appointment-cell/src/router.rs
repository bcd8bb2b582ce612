use axum::{
    routing::{get, patch},
    Router,
};

use crate::handlers::{
    cancel_appointment, create_appointment, list_appointments, update_appointment,
    AppointmentCellState,
};

pub fn create_appointments_router(state: AppointmentCellState) -> Router {
    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route("/{id}", patch(update_appointment).delete(cancel_appointment))
        .with_state(state)
}
