//! Linux `/sys/class/gpio` backend

use std::{
    fs,
    path::{Path, PathBuf},
    thread::sleep,
    time::Duration,
};

use tracing::{debug, info};

use super::{InputLine, OutputLine};
use crate::error::HardwareError;

const GPIO_ROOT: &str = "/sys/class/gpio";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// A GPIO pin exported through sysfs
#[derive(Debug)]
pub struct SysfsLine {
    name: &'static str,
    pin: u32,
    root: PathBuf,
}

impl SysfsLine {
    /// Export `pin`, set its direction and, for outputs, drive it low
    pub fn open(name: &'static str, pin: u32, direction: Direction) -> Result<Self, HardwareError> {
        Self::open_at(Path::new(GPIO_ROOT), name, pin, direction)
    }

    fn open_at(
        root: &Path,
        name: &'static str,
        pin: u32,
        direction: Direction,
    ) -> Result<Self, HardwareError> {
        let line = Self {
            name,
            pin,
            root: root.to_path_buf(),
        };
        let setup_err = |e: std::io::Error| HardwareError::Setup {
            line: name.to_string(),
            message: e.to_string(),
        };

        if !line.pin_dir().exists() {
            fs::write(root.join("export"), pin.to_string()).map_err(setup_err)?;
            // udev needs a moment to fix up permissions on the new directory
            sleep(Duration::from_millis(100));
        }
        fs::write(line.pin_dir().join("direction"), direction.as_str()).map_err(setup_err)?;
        if direction == Direction::Out {
            line.set(false)?;
        }

        info!("GPIO{} configured as {} ({})", pin, direction.as_str(), name);
        Ok(line)
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    fn unexport(&self) -> Result<(), HardwareError> {
        debug!("Releasing GPIO{} ({})", self.pin, self.name);
        fs::write(self.root.join("unexport"), self.pin.to_string()).map_err(|e| {
            HardwareError::Setup {
                line: self.name.to_string(),
                message: e.to_string(),
            }
        })
    }
}

impl OutputLine for SysfsLine {
    fn set(&self, high: bool) -> Result<(), HardwareError> {
        fs::write(self.pin_dir().join("value"), if high { "1" } else { "0" }).map_err(|e| {
            HardwareError::Write {
                line: self.name.to_string(),
                message: e.to_string(),
            }
        })
    }

    fn release(&self) -> Result<(), HardwareError> {
        self.set(false)?;
        self.unexport()
    }
}

impl InputLine for SysfsLine {
    fn read(&self) -> Result<bool, HardwareError> {
        let raw = fs::read_to_string(self.pin_dir().join("value")).map_err(|e| {
            HardwareError::Read {
                line: self.name.to_string(),
                message: e.to_string(),
            }
        })?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(HardwareError::Read {
                line: self.name.to_string(),
                message: format!("unexpected value {:?}", other),
            }),
        }
    }

    fn release(&self) -> Result<(), HardwareError> {
        self.unexport()
    }
}
