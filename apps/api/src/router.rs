use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};

use appointment_cell::handlers::AppointmentCellState;
use appointment_cell::create_appointments_router;
use consultant_cell::handlers::ConsultantCellState;
use consultant_cell::create_consultants_router;
use notification_cell::handlers::NotificationCellState;
use notification_cell::create_settings_router;
use whatsapp_cell::handlers::WhatsAppCellState;
use whatsapp_cell::create_whatsapp_router;

pub struct ApiContext {
    pub consultants: ConsultantCellState,
    pub appointments: AppointmentCellState,
    pub settings: NotificationCellState,
    pub whatsapp: WhatsAppCellState,
}

pub fn create_router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .nest("/api/consultants", create_consultants_router(ctx.consultants))
        .nest("/api/appointments", create_appointments_router(ctx.appointments))
        .nest("/api/settings", create_settings_router(ctx.settings))
        .nest("/api/whatsapp", create_whatsapp_router(ctx.whatsapp))
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}
