//! Emergency-stop latch

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Electrical level that means "emergency stop engaged"
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SensorPolarity {
    ActiveHigh,
    ActiveLow,
}

impl SensorPolarity {
    pub fn is_engaged(self, level: bool) -> bool {
        match self {
            SensorPolarity::ActiveHigh => level,
            SensorPolarity::ActiveLow => !level,
        }
    }

    /// Raw level that reads as `engaged`
    pub fn level_for(self, engaged: bool) -> bool {
        match self {
            SensorPolarity::ActiveHigh => engaged,
            SensorPolarity::ActiveLow => !engaged,
        }
    }
}

/// Transition reported by [`SafetySupervisor::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyEdge {
    /// Sensor just became active
    Tripped,
    /// Sensor just released
    Cleared,
}

/// Edge-triggered emergency-stop latch
///
/// ```text
///            engaged                 released
///  Armed ─────────────► Tripped ─────────────► Armed
///    ▲ released (none)     │ engaged (none)
/// ```
///
/// Each physical press yields exactly one `Tripped` and each release
/// exactly one `Cleared`, however many polls see the same level.
#[derive(Debug, Clone)]
pub struct SafetySupervisor {
    polarity: SensorPolarity,
    tripped: bool,
}

impl SafetySupervisor {
    pub fn new(polarity: SensorPolarity) -> Self {
        Self {
            polarity,
            tripped: false,
        }
    }

    pub fn polarity(&self) -> SensorPolarity {
        self.polarity
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    /// Feed one raw sensor reading
    pub fn observe(&mut self, level: bool) -> Option<SafetyEdge> {
        let engaged = self.polarity.is_engaged(level);
        match (self.tripped, engaged) {
            (false, true) => {
                self.tripped = true;
                Some(SafetyEdge::Tripped)
            }
            (true, false) => {
                self.tripped = false;
                Some(SafetyEdge::Cleared)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_trip_per_activation() {
        let mut supervisor = SafetySupervisor::new(SensorPolarity::ActiveHigh);
        assert_eq!(supervisor.observe(false), None);
        assert_eq!(supervisor.observe(true), Some(SafetyEdge::Tripped));
        assert_eq!(supervisor.observe(true), None);
        assert_eq!(supervisor.observe(true), None);
        assert!(supervisor.is_tripped());

        assert_eq!(supervisor.observe(false), Some(SafetyEdge::Cleared));
        assert_eq!(supervisor.observe(false), None);
        assert!(!supervisor.is_tripped());
    }

    #[test]
    fn rearms_after_release() {
        let mut supervisor = SafetySupervisor::new(SensorPolarity::ActiveHigh);
        supervisor.observe(true);
        supervisor.observe(false);
        assert_eq!(supervisor.observe(true), Some(SafetyEdge::Tripped));
    }

    #[test]
    fn active_low_inverts_level() {
        let mut supervisor = SafetySupervisor::new(SensorPolarity::ActiveLow);
        assert_eq!(supervisor.observe(true), None);
        assert_eq!(supervisor.observe(false), Some(SafetyEdge::Tripped));
        assert_eq!(supervisor.observe(true), Some(SafetyEdge::Cleared));
    }
}
