use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use tracing::error;

use shared_models::AppError;

use crate::models::ChannelStatus;
use crate::services::{StatusHub, WhatsAppGatewayClient};

#[derive(Clone)]
pub struct WhatsAppCellState {
    pub gateway: Arc<WhatsAppGatewayClient>,
    pub hub: Arc<StatusHub>,
}

pub async fn get_status(State(state): State<WhatsAppCellState>) -> Result<Json<ChannelStatus>, AppError> {
    let status = match state.gateway.status().await {
        Ok(status) => status,
        Err(e) => {
            error!("Failed to fetch gateway status: {}", e);
            state.hub.latest_status().await.unwrap_or(ChannelStatus::Unknown)
        }
    };
    state.hub.publish_status(status.clone()).await;
    Ok(Json(status))
}

pub async fn get_qr(State(state): State<WhatsAppCellState>) -> Response {
    match state.gateway.latest_qr().await {
        Ok(Some(qr)) => {
            state.hub.publish_qr(qr.clone()).await;
            Json(json!({ "type": "qr", "data": qr })).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "code": "NO_QR", "message": "No QR available" })),
        )
            .into_response(),
        Err(e) => AppError::ExternalService(e.to_string()).into_response(),
    }
}

pub async fn logout(State(state): State<WhatsAppCellState>) -> Result<Json<Value>, AppError> {
    state
        .gateway
        .logout()
        .await
        .map_err(|e| AppError::ExternalService(e.to_string()))?;
    state
        .hub
        .publish_status(ChannelStatus::Disconnected { reason: Some("manual".to_string()) })
        .await;
    Ok(Json(json!({ "ok": true })))
}

/// Re-emit the latest known status and QR to all subscribers.
pub async fn refresh(State(state): State<WhatsAppCellState>) -> Result<Json<Value>, AppError> {
    let status = state.hub.latest_status().await;
    if let Some(status) = status.clone() {
        state.hub.publish_status(status).await;
    }
    let qr = state.hub.latest_qr().await;
    Ok(Json(json!({ "ok": true, "status": status, "qr": qr })))
}
