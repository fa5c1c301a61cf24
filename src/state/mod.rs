//! State management module
//!
//! Timer state machines, the actuator panel, the emergency-stop latch,
//! the maintenance gate, and the controller that ties them together.

pub mod actuator_panel;
pub mod app_state;
pub mod maintenance;
pub mod supervisor;
pub mod timer_unit;

// Re-export main types
pub use actuator_panel::{ActuatorPanel, LightState, PanelSnapshot};
pub use app_state::{
    AppState, ControllerSettings, ControllerSnapshot, Outcome, TimerPreset, TimerView, UnlockPolicy,
};
pub use maintenance::{MaintenanceGate, MaintenanceToken};
pub use supervisor::{SafetyEdge, SafetySupervisor, SensorPolarity};
pub use timer_unit::{TickOutcome, TimerPhase, TimerUnit};
