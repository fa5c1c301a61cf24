//! Error types shared across the controller

use thiserror::Error;

/// Failure talking to a GPIO line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    #[error("failed to write line {line}: {message}")]
    Write { line: String, message: String },
    #[error("failed to read line {line}: {message}")]
    Read { line: String, message: String },
    #[error("failed to configure line {line}: {message}")]
    Setup { line: String, message: String },
}

/// Errors surfaced to the operator
///
/// Precondition violations (starting a running timer, adjusting a preset
/// outside maintenance mode) are not errors; see [`crate::state::Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("no timer with id {0}")]
    UnknownTimer(usize),
    #[error("incorrect password")]
    AuthenticationFailed,
    #[error("title cannot be empty")]
    InvalidTitle,
    #[error("failed to lock {0}")]
    StatePoisoned(&'static str),
}
