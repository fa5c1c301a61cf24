//! API request and response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::ControllerError,
    state::{ControllerSnapshot, Outcome},
};

/// API response structure for command endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub state: Option<ControllerSnapshot>,
}

impl ApiResponse {
    /// Create a new API response
    pub fn new(status: String, message: String, state: Option<ControllerSnapshot>) -> Self {
        Self {
            status,
            message,
            timestamp: Utc::now(),
            state,
        }
    }

    /// Response for a command that ran to completion or was skipped
    pub fn outcome(outcome: Outcome, message: String, state: Option<ControllerSnapshot>) -> Self {
        let status = match outcome {
            Outcome::Applied => "applied",
            Outcome::Ignored => "ignored",
        };
        Self::new(status.to_string(), message, state)
    }

    /// Create an error response
    pub fn error(message: String) -> Self {
        Self::new("error".to_string(), message, None)
    }
}

/// Controller error rendered for the operator
#[derive(Debug)]
pub struct ApiError(pub StatusCode, pub String);

impl From<ControllerError> for ApiError {
    fn from(e: ControllerError) -> Self {
        let status = match &e {
            ControllerError::UnknownTimer(_) => StatusCode::NOT_FOUND,
            ControllerError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            ControllerError::InvalidTitle => StatusCode::UNPROCESSABLE_ENTITY,
            ControllerError::StatePoisoned(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ApiResponse::error(self.1))).into_response()
    }
}

/// Status response with server metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub controller: ControllerSnapshot,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Returned by a successful maintenance login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceResponse {
    pub status: String,
    pub token: String,
    pub timestamp: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustRequest {
    pub delta_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

/// Body for destructive operator commands
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulateEstopRequest {
    pub engaged: bool,
}
