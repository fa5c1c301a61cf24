//! Host service module
//!
//! This module contains system operations such as reboot and poweroff.

pub mod system;

// Re-export main functions
pub use system::*;
