//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timers/:id/start", post(start_handler))
        .route("/timers/:id/acknowledge", post(acknowledge_handler))
        .route("/timers/:id/reset", post(reset_handler))
        .route("/timers/:id/adjust", post(adjust_handler))
        .route("/timers/:id/rename", post(rename_handler))
        .route("/maintenance/enter", post(maintenance_enter_handler))
        .route("/maintenance/exit", post(maintenance_exit_handler))
        .route("/door/unlock", post(door_unlock_handler))
        .route("/alerts/clear", post(clear_alerts_handler))
        .route("/system/exit", post(exit_handler))
        .route("/system/reboot", post(reboot_handler))
        .route("/system/poweroff", post(poweroff_handler))
        .route("/simulate/estop", post(simulate_estop_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
