//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod countdown;
pub mod safety_monitor;

// Re-export main functions
pub use countdown::spawn_countdown;
pub use safety_monitor::safety_monitor_task;
