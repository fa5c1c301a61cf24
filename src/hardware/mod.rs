//! GPIO abstraction
//!
//! The controller only ever sees named binary outputs and one binary input.
//! Backends decide how a level reaches the pin.

pub mod simulated;
pub mod sysfs;

use crate::error::HardwareError;

pub use simulated::SimulatedLine;
pub use sysfs::{Direction, SysfsLine};

/// A binary output such as the solenoid, a light or the buzzer
pub trait OutputLine: Send + Sync + std::fmt::Debug {
    /// Drive the line high (`true`) or low (`false`)
    fn set(&self, high: bool) -> Result<(), HardwareError>;

    /// Give the line back to the system at shutdown
    fn release(&self) -> Result<(), HardwareError> {
        Ok(())
    }
}

/// A binary input, read as its raw electrical level
pub trait InputLine: Send + Sync + std::fmt::Debug {
    fn read(&self) -> Result<bool, HardwareError>;

    fn release(&self) -> Result<(), HardwareError> {
        Ok(())
    }
}

/// The binary outputs driven by the actuator panel
#[derive(Debug)]
pub struct ActuatorLines {
    pub solenoid: Box<dyn OutputLine>,
    pub green: Box<dyn OutputLine>,
    pub red: Box<dyn OutputLine>,
    pub orange: Box<dyn OutputLine>,
    pub buzzer: Box<dyn OutputLine>,
}

/// Every line of the installation
#[derive(Debug)]
pub struct PanelLines {
    pub actuators: ActuatorLines,
    pub estop: Box<dyn InputLine>,
}

/// Handles onto a fully simulated panel, kept by whoever wants to inspect
/// or drive it (tests, the `/simulate` endpoint)
#[derive(Debug, Clone)]
pub struct SimulatedPanel {
    pub solenoid: SimulatedLine,
    pub green: SimulatedLine,
    pub red: SimulatedLine,
    pub orange: SimulatedLine,
    pub buzzer: SimulatedLine,
    pub estop: SimulatedLine,
}

impl SimulatedPanel {
    pub fn new() -> Self {
        Self {
            solenoid: SimulatedLine::new("solenoid"),
            green: SimulatedLine::new("green"),
            red: SimulatedLine::new("red"),
            orange: SimulatedLine::new("orange"),
            buzzer: SimulatedLine::new("buzzer"),
            estop: SimulatedLine::new("estop"),
        }
    }

    /// Boxed clones sharing state with this panel
    pub fn lines(&self) -> PanelLines {
        PanelLines {
            actuators: ActuatorLines {
                solenoid: Box::new(self.solenoid.clone()),
                green: Box::new(self.green.clone()),
                red: Box::new(self.red.clone()),
                orange: Box::new(self.orange.clone()),
                buzzer: Box::new(self.buzzer.clone()),
            },
            estop: Box::new(self.estop.clone()),
        }
    }
}

impl Default for SimulatedPanel {
    fn default() -> Self {
        Self::new()
    }
}

/// Pin numbers for the sysfs backend
#[derive(Debug, Clone, Copy)]
pub struct PinMap {
    pub solenoid: u32,
    pub green: u32,
    pub red: u32,
    pub orange: u32,
    pub buzzer: u32,
    pub estop: u32,
}

impl PinMap {
    /// Export and configure every pin through `/sys/class/gpio`
    pub fn open_sysfs(&self) -> Result<PanelLines, HardwareError> {
        Ok(PanelLines {
            actuators: ActuatorLines {
                solenoid: Box::new(SysfsLine::open("solenoid", self.solenoid, Direction::Out)?),
                green: Box::new(SysfsLine::open("green", self.green, Direction::Out)?),
                red: Box::new(SysfsLine::open("red", self.red, Direction::Out)?),
                orange: Box::new(SysfsLine::open("orange", self.orange, Direction::Out)?),
                buzzer: Box::new(SysfsLine::open("buzzer", self.buzzer, Direction::Out)?),
            },
            estop: Box::new(SysfsLine::open("estop", self.estop, Direction::In)?),
        })
    }
}
