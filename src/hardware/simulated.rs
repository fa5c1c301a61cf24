//! In-memory GPIO line

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use tracing::debug;

use super::{InputLine, OutputLine};
use crate::error::HardwareError;

#[derive(Debug, Default)]
struct Shared {
    level: AtomicBool,
    fail_reads: AtomicBool,
    released: AtomicBool,
    writes: Mutex<Vec<bool>>,
}

/// A line whose level lives in memory. Clones share the same level, so a
/// test can keep one handle while the panel owns another.
#[derive(Debug, Clone)]
pub struct SimulatedLine {
    name: &'static str,
    shared: Arc<Shared>,
}

impl SimulatedLine {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current level
    pub fn level(&self) -> bool {
        self.shared.level.load(Ordering::SeqCst)
    }

    /// Drive an input line from the outside world
    pub fn drive(&self, high: bool) {
        self.shared.level.store(high, Ordering::SeqCst);
    }

    /// Make subsequent reads fail until cleared
    pub fn fail_reads(&self, fail: bool) {
        self.shared.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Every level written through [`OutputLine::set`], oldest first
    pub fn writes(&self) -> Vec<bool> {
        self.shared
            .writes
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    /// Number of writes of the given level
    pub fn count_writes(&self, high: bool) -> usize {
        self.writes().into_iter().filter(|w| *w == high).count()
    }

    /// True once the owner has given the line back
    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    fn mark_released(&self) {
        self.shared.released.store(true, Ordering::SeqCst);
        debug!("{} released", self.name);
    }

    pub fn clear_writes(&self) {
        if let Ok(mut writes) = self.shared.writes.lock() {
            writes.clear();
        }
    }
}

impl OutputLine for SimulatedLine {
    fn set(&self, high: bool) -> Result<(), HardwareError> {
        let mut writes = self.shared.writes.lock().map_err(|e| HardwareError::Write {
            line: self.name.to_string(),
            message: e.to_string(),
        })?;
        writes.push(high);
        self.shared.level.store(high, Ordering::SeqCst);
        debug!("{} -> {}", self.name, if high { "HIGH" } else { "LOW" });
        Ok(())
    }

    fn release(&self) -> Result<(), HardwareError> {
        self.mark_released();
        Ok(())
    }
}

impl InputLine for SimulatedLine {
    fn read(&self) -> Result<bool, HardwareError> {
        if self.shared.fail_reads.load(Ordering::SeqCst) {
            return Err(HardwareError::Read {
                line: self.name.to_string(),
                message: "simulated read failure".to_string(),
            });
        }
        Ok(self.level())
    }

    fn release(&self) -> Result<(), HardwareError> {
        self.mark_released();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_level_and_write_log() {
        let line = SimulatedLine::new("buzzer");
        let handle = line.clone();

        line.set(true).unwrap();
        line.set(false).unwrap();

        assert!(!handle.level());
        assert_eq!(handle.writes(), vec![true, false]);
        assert_eq!(handle.count_writes(true), 1);
    }

    #[test]
    fn read_failures_can_be_injected() {
        let line = SimulatedLine::new("estop");
        line.drive(true);
        assert_eq!(line.read(), Ok(true));

        line.fail_reads(true);
        assert!(matches!(line.read(), Err(HardwareError::Read { .. })));

        line.fail_reads(false);
        assert_eq!(line.read(), Ok(true));
    }
}
