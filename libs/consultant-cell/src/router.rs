use axum::{
    routing::{get, patch},
    Router,
};

use crate::handlers::{
    create_consultant, delete_consultant, list_consultants, update_consultant, ConsultantCellState,
};

pub fn create_consultants_router(state: ConsultantCellState) -> Router {
    Router::new()
        .route("/", get(list_consultants).post(create_consultant))
        .route("/{id}", patch(update_consultant).delete(delete_consultant))
        .with_state(state)
}
