use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{get_qr, get_status, logout, refresh, WhatsAppCellState};

pub fn create_whatsapp_router(state: WhatsAppCellState) -> Router {
    Router::new()
        .route("/qr", get(get_qr))
        .route("/status", get(get_status))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .with_state(state)
}
