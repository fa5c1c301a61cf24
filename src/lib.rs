//! Oven Timer - a door-interlocked oven timer controller
//!
//! This library drives a bank of independent countdown timers, a door
//! solenoid, a light tower and a buzzer, supervised by an emergency-stop
//! input, and exposes the operator panel over HTTP.

pub mod config;
pub mod error;
pub mod hardware;
pub mod state;
pub mod api;
pub mod services;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{ControllerError, HardwareError};
pub use state::AppState;
pub use api::create_router;
pub use utils::signals::shutdown_signal;
