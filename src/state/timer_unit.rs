//! Countdown timer state machine

use serde::{Deserialize, Serialize};

use crate::error::ControllerError;

/// Where a timer is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    Idle,
    Running,
    /// Countdown reached zero; `acknowledged` flips once the operator
    /// silences the alarm
    Done { acknowledged: bool },
}

/// Result of one countdown step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still counting
    Continue,
    /// Reached zero on this step
    Completed,
    /// Timer was not running; the caller's countdown should stop
    Stopped,
}

/// One of the independent oven timers
///
/// Pure state: actuator requests are made by the controller that owns it.
#[derive(Debug, Clone)]
pub struct TimerUnit {
    title: String,
    default_seconds: u64,
    preset_seconds: u64,
    remaining_seconds: u64,
    phase: TimerPhase,
    /// Bumped on every start so stale countdown tasks can tell they are stale
    run_id: u64,
}

impl TimerUnit {
    pub fn new(title: impl Into<String>, default_seconds: u64) -> Self {
        Self {
            title: title.into(),
            default_seconds,
            preset_seconds: default_seconds,
            remaining_seconds: default_seconds,
            phase: TimerPhase::Idle,
            run_id: 0,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn default_seconds(&self) -> u64 {
        self.default_seconds
    }

    pub fn preset_seconds(&self) -> u64 {
        self.preset_seconds
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    /// Done and still waiting for the operator to silence the alarm
    pub fn is_alarming(&self) -> bool {
        self.phase == TimerPhase::Done { acknowledged: false }
    }

    /// Idle -> Running. Returns false when the timer was not idle.
    pub fn start(&mut self) -> bool {
        if self.phase != TimerPhase::Idle {
            return false;
        }
        self.phase = TimerPhase::Running;
        self.run_id += 1;
        true
    }

    /// Advance the countdown by one second
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != TimerPhase::Running {
            return TickOutcome::Stopped;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.phase = TimerPhase::Done { acknowledged: false };
            TickOutcome::Completed
        } else {
            TickOutcome::Continue
        }
    }

    /// Running with nothing left to count: finish without waiting a tick
    pub fn complete_if_empty(&mut self) -> bool {
        if self.phase == TimerPhase::Running && self.remaining_seconds == 0 {
            self.phase = TimerPhase::Done { acknowledged: false };
            return true;
        }
        false
    }

    /// Done(unacknowledged) -> Done(acknowledged)
    pub fn acknowledge(&mut self) -> bool {
        if !self.is_alarming() {
            return false;
        }
        self.phase = TimerPhase::Done { acknowledged: true };
        true
    }

    /// Done(acknowledged) -> Idle, restoring the preset
    pub fn reset(&mut self) -> bool {
        if self.phase != (TimerPhase::Done { acknowledged: true }) {
            return false;
        }
        self.go_idle();
        true
    }

    /// Any state -> Idle, used by the safety supervisor
    pub fn force_idle(&mut self) {
        self.go_idle();
    }

    /// Discard maintenance adjustments and go back to the factory duration
    pub fn restore_default(&mut self) {
        self.preset_seconds = self.default_seconds;
        self.go_idle();
    }

    /// Shift the preset by `delta_seconds`, clamped at zero. Only while idle.
    pub fn adjust_preset(&mut self, delta_seconds: i64) -> bool {
        if self.phase != TimerPhase::Idle {
            return false;
        }
        let adjusted = if delta_seconds >= 0 {
            self.preset_seconds.saturating_add(delta_seconds.unsigned_abs())
        } else {
            self.preset_seconds.saturating_sub(delta_seconds.unsigned_abs())
        };
        self.preset_seconds = adjusted;
        self.remaining_seconds = adjusted;
        true
    }

    pub fn rename(&mut self, title: &str) -> Result<(), ControllerError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ControllerError::InvalidTitle);
        }
        self.title = title.to_string();
        Ok(())
    }

    fn go_idle(&mut self) {
        self.phase = TimerPhase::Idle;
        self.remaining_seconds = self.preset_seconds;
    }
}

/// `HH:MM:SS`, as shown on the panel
pub fn format_hms(seconds: u64) -> String {
    let (mins, secs) = (seconds / 60, seconds % 60);
    let (hrs, mins) = (mins / 60, mins % 60);
    format!("{:02}:{:02}:{:02}", hrs, mins, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_one_second_per_tick() {
        let mut unit = TimerUnit::new("Timer 1", 3);
        assert!(unit.start());

        assert_eq!(unit.tick(), TickOutcome::Continue);
        assert_eq!(unit.remaining_seconds(), 2);
        assert_eq!(unit.tick(), TickOutcome::Continue);
        assert_eq!(unit.remaining_seconds(), 1);
        assert_eq!(unit.tick(), TickOutcome::Completed);
        assert_eq!(unit.remaining_seconds(), 0);
        assert_eq!(unit.phase(), TimerPhase::Done { acknowledged: false });

        // Never goes below zero
        assert_eq!(unit.tick(), TickOutcome::Stopped);
        assert_eq!(unit.remaining_seconds(), 0);
    }

    #[test]
    fn start_only_from_idle() {
        let mut unit = TimerUnit::new("Timer 1", 2);
        assert!(unit.start());
        unit.tick();
        let before = unit.remaining_seconds();
        assert!(!unit.start());
        assert_eq!(unit.remaining_seconds(), before);
        assert!(unit.is_running());

        unit.tick();
        assert!(!unit.start());
        assert_eq!(unit.phase(), TimerPhase::Done { acknowledged: false });
    }

    #[test]
    fn reset_requires_acknowledgement() {
        let mut unit = TimerUnit::new("Timer 1", 1);
        unit.start();
        unit.tick();

        assert!(!unit.reset());
        assert!(unit.acknowledge());
        assert!(!unit.acknowledge());
        assert!(unit.reset());
        assert_eq!(unit.phase(), TimerPhase::Idle);
        assert_eq!(unit.remaining_seconds(), 1);
    }

    #[test]
    fn zero_length_timer_completes_at_start() {
        let mut unit = TimerUnit::new("Timer 1", 0);
        assert!(unit.start());
        assert!(unit.complete_if_empty());
        assert!(unit.is_alarming());
    }

    #[test]
    fn adjust_preset_clamps_and_updates_remaining() {
        let mut unit = TimerUnit::new("Timer 1", 90);
        assert!(unit.adjust_preset(3600));
        assert_eq!(unit.preset_seconds(), 3690);
        assert_eq!(unit.remaining_seconds(), 3690);

        assert!(unit.adjust_preset(-7200));
        assert_eq!(unit.preset_seconds(), 0);
        assert_eq!(unit.remaining_seconds(), 0);

        unit.adjust_preset(60);
        unit.start();
        assert!(!unit.adjust_preset(60));
        assert_eq!(unit.preset_seconds(), 60);
    }

    #[test]
    fn restore_default_discards_adjustments() {
        let mut unit = TimerUnit::new("Timer 1", 45 * 60);
        unit.adjust_preset(-60);
        unit.start();
        unit.tick();

        unit.restore_default();
        assert_eq!(unit.phase(), TimerPhase::Idle);
        assert_eq!(unit.preset_seconds(), 45 * 60);
        assert_eq!(unit.remaining_seconds(), 45 * 60);
    }

    #[test]
    fn rename_rejects_blank_titles() {
        let mut unit = TimerUnit::new("Timer 1", 10);
        assert_eq!(unit.rename("   "), Err(ControllerError::InvalidTitle));
        assert_eq!(unit.title(), "Timer 1");

        unit.rename("  Nivio Evaluation ").unwrap();
        assert_eq!(unit.title(), "Nivio Evaluation");
    }

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(2 * 3600 + 5 * 60 + 7), "02:05:07");
    }
}
