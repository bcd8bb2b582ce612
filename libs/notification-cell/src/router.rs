use axum::{routing::get, Router};

use crate::handlers::{get_settings, put_settings, NotificationCellState};

pub fn create_settings_router(state: NotificationCellState) -> Router {
    Router::new()
        .route("/", get(get_settings).put(put_settings))
        .with_state(state)
}
