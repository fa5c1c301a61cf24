//! Controller state shared by the API handlers and background tasks

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{
    actuator_panel::{ActuatorPanel, LightState, PanelSnapshot},
    maintenance::{MaintenanceGate, MaintenanceToken},
    supervisor::{SafetyEdge, SafetySupervisor, SensorPolarity},
    timer_unit::{format_hms, TickOutcome, TimerPhase, TimerUnit},
};
use crate::{
    error::ControllerError,
    hardware::{ActuatorLines, SimulatedPanel},
    tasks::spawn_countdown,
};

/// When the door solenoid is released at the end of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnlockPolicy {
    /// Silencing the alarm opens the door; reset locks it again
    OnAcknowledge,
    /// The door stays locked until the timer is reset
    OnReset,
}

/// Whether an operator command changed anything
///
/// Commands whose preconditions do not hold (stale button presses) are
/// ignored rather than reported as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    Ignored,
}

impl From<bool> for Outcome {
    fn from(applied: bool) -> Self {
        if applied {
            Outcome::Applied
        } else {
            Outcome::Ignored
        }
    }
}

/// Factory title and duration of one timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerPreset {
    pub title: String,
    pub seconds: u64,
}

/// Everything the controller needs besides hardware
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub timers: Vec<TimerPreset>,
    pub maintenance_password: String,
    pub polarity: SensorPolarity,
    pub unlock_policy: UnlockPolicy,
    pub countdown_interval: Duration,
    pub buzzer_interval: Duration,
}

impl ControllerSettings {
    /// Factory timer set of the oven panel
    pub fn factory_timers() -> Vec<TimerPreset> {
        vec![
            TimerPreset {
                title: "Timer 1".to_string(),
                seconds: 2 * 60 * 60,
            },
            TimerPreset {
                title: "Timer 2".to_string(),
                seconds: 60 * 60,
            },
            TimerPreset {
                title: "Timer 3".to_string(),
                seconds: 45 * 60,
            },
        ]
    }
}

/// A message the operator has to see and dismiss
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// One timer as the operator panel sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerView {
    pub id: usize,
    pub title: String,
    pub phase: TimerPhase,
    pub remaining_seconds: u64,
    pub remaining_display: String,
    pub preset_seconds: u64,
    pub default_seconds: u64,
    pub can_start: bool,
    pub can_acknowledge: bool,
    pub can_reset: bool,
    pub can_edit: bool,
}

/// Full controller snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub timers: Vec<TimerView>,
    pub panel: PanelSnapshot,
    pub emergency_stop: bool,
    pub maintenance_active: bool,
    pub alerts: Vec<Alert>,
    pub sensor_faults: u64,
}

#[derive(Debug)]
struct Inner {
    timers: Vec<TimerUnit>,
    supervisor: SafetySupervisor,
    gate: MaintenanceGate,
    alerts: Vec<Alert>,
    sensor_faults: u64,
}

impl Inner {
    fn unit(&mut self, id: usize) -> Result<&mut TimerUnit, ControllerError> {
        self.timers.get_mut(id).ok_or(ControllerError::UnknownTimer(id))
    }

    fn any_running(&self) -> bool {
        self.timers.iter().any(TimerUnit::is_running)
    }

    fn any_alarming(&self) -> bool {
        self.timers.iter().any(TimerUnit::is_alarming)
    }

    /// Light tower shows the most urgent state of any timer
    fn light_state(&self) -> LightState {
        if self.supervisor.is_tripped() {
            return LightState::EmergencyStop;
        }
        self.timers
            .iter()
            .map(|unit| match unit.phase() {
                TimerPhase::Idle => LightState::Standby,
                TimerPhase::Running => LightState::Running,
                TimerPhase::Done { .. } => LightState::Done,
            })
            .max()
            .unwrap_or(LightState::Standby)
    }

    fn raise_alert(&mut self, message: &str) {
        warn!("Alert: {}", message);
        self.alerts.push(Alert {
            message: message.to_string(),
            raised_at: Utc::now(),
        });
    }
}

/// The oven controller
///
/// Every command and every safety edge goes through one lock, so an
/// emergency stop and a concurrent button press are applied in some order
/// and never interleaved.
#[derive(Debug)]
pub struct AppState {
    inner: Mutex<Inner>,
    pub panel: ActuatorPanel,
    unlock_policy: UnlockPolicy,
    countdown_interval: Duration,
    /// Present when running against the simulated backend
    simulator: Option<SimulatedPanel>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
    /// Flipped to true when the operator confirms exit
    pub exit_tx: watch::Sender<bool>,
}

impl AppState {
    pub fn new(
        settings: ControllerSettings,
        actuators: ActuatorLines,
        host: String,
        port: u16,
    ) -> Self {
        let timers = settings
            .timers
            .iter()
            .map(|preset| TimerUnit::new(preset.title.clone(), preset.seconds))
            .collect();
        let panel = ActuatorPanel::new(actuators, settings.buzzer_interval);
        panel.initialize();
        let (exit_tx, _) = watch::channel(false);

        Self {
            inner: Mutex::new(Inner {
                timers,
                supervisor: SafetySupervisor::new(settings.polarity),
                gate: MaintenanceGate::new(settings.maintenance_password),
                alerts: Vec::new(),
                sensor_faults: 0,
            }),
            panel,
            unlock_policy: settings.unlock_policy,
            countdown_interval: settings.countdown_interval,
            simulator: None,
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
            exit_tx,
        }
    }

    /// Keep handles onto the simulated lines so the API can drive them
    pub fn with_simulator(mut self, simulator: SimulatedPanel) -> Self {
        self.simulator = Some(simulator);
        self
    }

    pub fn simulator(&self) -> Option<&SimulatedPanel> {
        self.simulator.as_ref()
    }

    pub fn countdown_interval(&self) -> Duration {
        self.countdown_interval
    }

    fn inner(&self) -> Result<MutexGuard<'_, Inner>, ControllerError> {
        self.inner
            .lock()
            .map_err(|_| ControllerError::StatePoisoned("controller state"))
    }

    /// The safety path proceeds even on a poisoned lock
    fn inner_for_safety(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            error!("Controller state poisoned, continuing with safety handling");
            poisoned.into_inner()
        })
    }

    fn record_action(&self, action: String) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action);
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Start a timer: locks the door and begins the countdown
    pub fn start_timer(self: &Arc<Self>, id: usize) -> Result<Outcome, ControllerError> {
        let mut inner = self.inner()?;
        let tripped = inner.supervisor.is_tripped();
        let unit = inner.unit(id)?;
        if tripped || !unit.start() {
            debug!("Start ignored for timer {}", id);
            return Ok(Outcome::Ignored);
        }

        info!(
            "Timer {} ({}) started: {}",
            id,
            unit.title(),
            format_hms(unit.remaining_seconds())
        );
        let completed = unit.complete_if_empty();
        let run_id = unit.run_id();

        self.panel.set_solenoid_locked(true);
        if completed {
            info!("Timer {} had nothing to count, done immediately", id);
            self.panel.set_buzzer_active(true);
        } else {
            spawn_countdown(Arc::clone(self), id, run_id);
        }
        self.panel.set_lights(inner.light_state());
        drop(inner);

        self.record_action(format!("start:{}", id));
        Ok(Outcome::Applied)
    }

    /// One countdown step for `run_id` of timer `id`
    ///
    /// Returns [`TickOutcome::Stopped`] once that run is over, including
    /// when the timer was forced idle or restarted in the meantime.
    pub fn countdown_step(&self, id: usize, run_id: u64) -> TickOutcome {
        let mut inner = self.inner_for_safety();
        let Some(unit) = inner.timers.get_mut(id) else {
            return TickOutcome::Stopped;
        };
        if unit.run_id() != run_id {
            return TickOutcome::Stopped;
        }

        let outcome = unit.tick();
        match outcome {
            TickOutcome::Completed => {
                info!("Timer {} ({}) done", id, unit.title());
                self.panel.set_buzzer_active(true);
                self.panel.set_lights(inner.light_state());
            }
            TickOutcome::Continue => {
                debug!(
                    "Timer {}: {} remaining",
                    id,
                    format_hms(unit.remaining_seconds())
                );
            }
            TickOutcome::Stopped => {}
        }
        outcome
    }

    /// Silence a finished timer's alarm
    pub fn acknowledge_buzzer(&self, id: usize) -> Result<Outcome, ControllerError> {
        let mut inner = self.inner()?;
        let tripped = inner.supervisor.is_tripped();
        let unit = inner.unit(id)?;
        if tripped || !unit.acknowledge() {
            debug!("Acknowledge ignored for timer {}", id);
            return Ok(Outcome::Ignored);
        }
        info!("Timer {} alarm acknowledged", id);

        if !inner.any_alarming() {
            self.panel.set_buzzer_active(false);
        }
        if self.unlock_policy == UnlockPolicy::OnAcknowledge {
            if inner.any_running() {
                info!("Door stays locked: another timer is running");
            } else {
                self.panel.set_solenoid_locked(false);
            }
        }
        drop(inner);

        self.record_action(format!("acknowledge:{}", id));
        Ok(Outcome::Applied)
    }

    /// Return an acknowledged timer to idle with its preset restored
    pub fn reset_timer(&self, id: usize) -> Result<Outcome, ControllerError> {
        let mut inner = self.inner()?;
        let tripped = inner.supervisor.is_tripped();
        let unit = inner.unit(id)?;
        if tripped || !unit.reset() {
            debug!("Reset ignored for timer {}", id);
            return Ok(Outcome::Ignored);
        }
        info!("Timer {} reset to {}", id, format_hms(unit.remaining_seconds()));

        match self.unlock_policy {
            UnlockPolicy::OnAcknowledge => self.panel.set_solenoid_locked(true),
            UnlockPolicy::OnReset => {
                if inner.any_running() {
                    info!("Door stays locked: another timer is running");
                } else {
                    self.panel.set_solenoid_locked(false);
                }
            }
        }
        self.panel.set_lights(inner.light_state());
        drop(inner);

        self.record_action(format!("reset:{}", id));
        Ok(Outcome::Applied)
    }

    pub fn adjust_preset(
        &self,
        id: usize,
        delta_seconds: i64,
        token: Option<&MaintenanceToken>,
    ) -> Result<Outcome, ControllerError> {
        let mut inner = self.inner()?;
        let authorized = inner.gate.authorizes(token);
        let unit = inner.unit(id)?;
        if !authorized || !unit.adjust_preset(delta_seconds) {
            debug!("Preset adjustment ignored for timer {}", id);
            return Ok(Outcome::Ignored);
        }
        info!("Timer {} preset now {}", id, format_hms(unit.preset_seconds()));
        drop(inner);

        self.record_action(format!("adjust:{}", id));
        Ok(Outcome::Applied)
    }

    pub fn rename_timer(
        &self,
        id: usize,
        title: &str,
        token: Option<&MaintenanceToken>,
    ) -> Result<Outcome, ControllerError> {
        let mut inner = self.inner()?;
        let authorized = inner.gate.authorizes(token);
        let unit = inner.unit(id)?;
        if !authorized {
            debug!("Rename ignored for timer {}", id);
            return Ok(Outcome::Ignored);
        }
        unit.rename(title)?;
        info!("Timer {} renamed to {:?}", id, unit.title());
        drop(inner);

        self.record_action(format!("rename:{}", id));
        Ok(Outcome::Applied)
    }

    pub fn enter_maintenance(&self, password: &str) -> Result<MaintenanceToken, ControllerError> {
        let token = self.inner()?.gate.enter(password)?;
        self.record_action("maintenance-enter".to_string());
        Ok(token)
    }

    pub fn exit_maintenance(&self) -> Result<Outcome, ControllerError> {
        let mut inner = self.inner()?;
        let was_active = inner.gate.is_active();
        inner.gate.exit();
        drop(inner);

        self.record_action("maintenance-exit".to_string());
        Ok(was_active.into())
    }

    /// Manual door release button
    pub fn unlock_door(&self) -> Result<Outcome, ControllerError> {
        let inner = self.inner()?;
        if inner.any_running() {
            warn!("Manual door release while a timer is running");
        }
        self.panel.set_solenoid_locked(false);
        drop(inner);

        self.record_action("door-unlock".to_string());
        Ok(Outcome::Applied)
    }

    /// Feed one raw emergency-stop reading
    pub fn observe_estop(&self, level: bool) -> Option<SafetyEdge> {
        let mut inner = self.inner_for_safety();
        let edge = inner.supervisor.observe(level)?;

        match edge {
            SafetyEdge::Tripped => {
                error!("EMERGENCY STOP engaged");
                for unit in inner.timers.iter_mut() {
                    unit.force_idle();
                }
                self.panel.set_solenoid_locked(false);
                self.panel.set_lights(LightState::EmergencyStop);
                self.panel.set_buzzer_active(true);
                inner.raise_alert("Emergency stop engaged: all timers stopped");
            }
            SafetyEdge::Cleared => {
                info!("Emergency stop released, restoring factory presets");
                if self.unlock_policy == UnlockPolicy::OnAcknowledge {
                    self.panel.set_solenoid_locked(true);
                }
                self.panel.set_buzzer_active(false);
                self.panel.set_lights(LightState::Standby);
                for unit in inner.timers.iter_mut() {
                    unit.restore_default();
                }
            }
        }
        drop(inner);

        self.record_action(match edge {
            SafetyEdge::Tripped => "estop-trip".to_string(),
            SafetyEdge::Cleared => "estop-clear".to_string(),
        });
        Some(edge)
    }

    /// Count a failed sensor read; returns the running total
    pub fn note_sensor_fault(&self) -> u64 {
        let mut inner = self.inner_for_safety();
        inner.sensor_faults += 1;
        inner.sensor_faults
    }

    pub fn sensor_polarity(&self) -> SensorPolarity {
        self.inner_for_safety().supervisor.polarity()
    }

    pub fn is_tripped(&self) -> bool {
        self.inner_for_safety().supervisor.is_tripped()
    }

    pub fn clear_alerts(&self) -> Result<usize, ControllerError> {
        let mut inner = self.inner()?;
        let cleared = inner.alerts.len();
        inner.alerts.clear();
        Ok(cleared)
    }

    pub fn snapshot(&self) -> Result<ControllerSnapshot, ControllerError> {
        let inner = self.inner()?;
        let tripped = inner.supervisor.is_tripped();
        let editing = inner.gate.is_active();

        let timers = inner
            .timers
            .iter()
            .enumerate()
            .map(|(id, unit)| TimerView {
                id,
                title: unit.title().to_string(),
                phase: unit.phase(),
                remaining_seconds: unit.remaining_seconds(),
                remaining_display: format_hms(unit.remaining_seconds()),
                preset_seconds: unit.preset_seconds(),
                default_seconds: unit.default_seconds(),
                can_start: !tripped && unit.phase() == TimerPhase::Idle,
                can_acknowledge: !tripped && unit.is_alarming(),
                can_reset: !tripped && unit.phase() == (TimerPhase::Done { acknowledged: true }),
                can_edit: editing && unit.phase() == TimerPhase::Idle,
            })
            .collect();

        Ok(ControllerSnapshot {
            timers,
            panel: self.panel.snapshot(),
            emergency_stop: tripped,
            maintenance_active: editing,
            alerts: inner.alerts.clone(),
            sensor_faults: inner.sensor_faults,
        })
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }

    /// Operator-confirmed exit
    pub fn request_exit(&self) {
        info!("Exit requested by operator");
        self.exit_tx.send_replace(true);
    }

    /// Silence and release all outputs
    pub fn shutdown(&self) {
        self.panel.release();
    }
}
