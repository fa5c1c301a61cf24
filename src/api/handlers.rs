//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    services::{execute_power_action, PowerAction},
    state::{AppState, MaintenanceToken, Outcome},
};
use super::responses::{
    AdjustRequest, ApiError, ApiResponse, ConfirmRequest, HealthResponse, LoginRequest,
    MaintenanceResponse, RenameRequest, SimulateEstopRequest, StatusResponse,
};

/// Header carrying the maintenance session token
pub const MAINTENANCE_TOKEN_HEADER: &str = "x-maintenance-token";

type ApiResult = Result<Json<ApiResponse>, ApiError>;

fn maintenance_token(headers: &HeaderMap) -> Option<MaintenanceToken> {
    headers
        .get(MAINTENANCE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(MaintenanceToken::new)
}

/// Wrap a command outcome together with the resulting controller state
fn respond(state: &AppState, outcome: Outcome, applied: String, ignored: &str) -> ApiResult {
    let message = match outcome {
        Outcome::Applied => applied,
        Outcome::Ignored => ignored.to_string(),
    };
    let snapshot = state.snapshot()?;
    Ok(Json(ApiResponse::outcome(outcome, message, Some(snapshot))))
}

/// Handle POST /timers/:id/start
pub async fn start_handler(State(state): State<Arc<AppState>>, Path(id): Path<usize>) -> ApiResult {
    let outcome = state.start_timer(id)?;
    respond(&state, outcome, format!("Timer {} started", id), "Timer cannot be started now")
}

/// Handle POST /timers/:id/acknowledge
pub async fn acknowledge_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<usize>,
) -> ApiResult {
    let outcome = state.acknowledge_buzzer(id)?;
    respond(&state, outcome, format!("Timer {} alarm silenced", id), "No alarm to silence")
}

/// Handle POST /timers/:id/reset
pub async fn reset_handler(State(state): State<Arc<AppState>>, Path(id): Path<usize>) -> ApiResult {
    let outcome = state.reset_timer(id)?;
    respond(&state, outcome, format!("Timer {} reset", id), "Timer cannot be reset now")
}

/// Handle POST /timers/:id/adjust
pub async fn adjust_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<usize>,
    headers: HeaderMap,
    Json(request): Json<AdjustRequest>,
) -> ApiResult {
    let token = maintenance_token(&headers);
    let outcome = state.adjust_preset(id, request.delta_seconds, token.as_ref())?;
    respond(
        &state,
        outcome,
        format!("Timer {} preset adjusted by {}s", id, request.delta_seconds),
        "Preset can only be changed in maintenance mode while the timer is idle",
    )
}

/// Handle POST /timers/:id/rename
pub async fn rename_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<usize>,
    headers: HeaderMap,
    Json(request): Json<RenameRequest>,
) -> ApiResult {
    let token = maintenance_token(&headers);
    let outcome = state.rename_timer(id, &request.title, token.as_ref())?;
    respond(
        &state,
        outcome,
        format!("Timer {} renamed", id),
        "Titles can only be changed in maintenance mode",
    )
}

/// Handle POST /maintenance/enter
pub async fn maintenance_enter_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<MaintenanceResponse>, ApiError> {
    let token = state.enter_maintenance(&request.password)?;
    Ok(Json(MaintenanceResponse {
        status: "maintenance".to_string(),
        token: token.as_str().to_string(),
        timestamp: Utc::now(),
    }))
}

/// Handle POST /maintenance/exit
pub async fn maintenance_exit_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    let outcome = state.exit_maintenance()?;
    respond(
        &state,
        outcome,
        "Returned to operation mode".to_string(),
        "Maintenance mode was not active",
    )
}

/// Handle POST /door/unlock
pub async fn door_unlock_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    let outcome = state.unlock_door()?;
    respond(&state, outcome, "Door unlocked".to_string(), "")
}

/// Handle POST /alerts/clear
pub async fn clear_alerts_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    let cleared = state.clear_alerts()?;
    respond(
        &state,
        (cleared > 0).into(),
        format!("Cleared {} alert(s)", cleared),
        "No alerts to clear",
    )
}

/// Handle POST /system/exit
pub async fn exit_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConfirmRequest>,
) -> ApiResult {
    if !request.confirm {
        return Ok(Json(ApiResponse::outcome(
            Outcome::Ignored,
            "Exit not confirmed".to_string(),
            None,
        )));
    }
    state.request_exit();
    Ok(Json(ApiResponse::outcome(Outcome::Applied, "Exiting".to_string(), None)))
}

async fn power_handler(action: PowerAction, confirm: bool) -> ApiResult {
    if !confirm {
        return Ok(Json(ApiResponse::outcome(
            Outcome::Ignored,
            format!("{:?} not confirmed", action),
            None,
        )));
    }
    match execute_power_action(action).await {
        Ok(()) => Ok(Json(ApiResponse::outcome(
            Outcome::Applied,
            format!("{:?} requested", action),
            None,
        ))),
        Err(e) => {
            error!("Power action failed: {}", e);
            Err(ApiError(StatusCode::INTERNAL_SERVER_ERROR, e))
        }
    }
}

/// Handle POST /system/reboot
pub async fn reboot_handler(Json(request): Json<ConfirmRequest>) -> ApiResult {
    power_handler(PowerAction::Reboot, request.confirm).await
}

/// Handle POST /system/poweroff
pub async fn poweroff_handler(Json(request): Json<ConfirmRequest>) -> ApiResult {
    power_handler(PowerAction::Poweroff, request.confirm).await
}

/// Handle POST /simulate/estop - only with the simulated backend
pub async fn simulate_estop_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SimulateEstopRequest>,
) -> ApiResult {
    let Some(simulator) = state.simulator() else {
        warn!("Simulated e-stop requested without the simulated backend");
        return Err(ApiError(
            StatusCode::CONFLICT,
            "Emergency stop can only be simulated with the simulated backend".to_string(),
        ));
    };
    let level = state.sensor_polarity().level_for(request.engaged);
    simulator.estop.drive(level);
    info!("Simulated emergency stop {}", if request.engaged { "pressed" } else { "released" });

    Ok(Json(ApiResponse::outcome(
        Outcome::Applied,
        "Sensor level updated; takes effect on the next poll".to_string(),
        None,
    )))
}

/// Handle GET /status - Return current controller status
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let controller = state.snapshot()?;
    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        controller,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
