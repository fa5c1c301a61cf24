//! Solenoid, light tower and buzzer outputs

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};

use crate::hardware::{ActuatorLines, OutputLine};

/// What the light tower is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightState {
    Standby,
    Running,
    Done,
    EmergencyStop,
}

impl LightState {
    /// (green, red, orange) levels
    fn levels(self) -> (bool, bool, bool) {
        match self {
            LightState::Standby => (false, false, true),
            LightState::Running => (true, false, false),
            LightState::Done => (false, true, true),
            LightState::EmergencyStop => (true, true, true),
        }
    }
}

/// Point-in-time view of the panel outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSnapshot {
    pub solenoid_locked: bool,
    pub light: LightState,
    pub buzzer_active: bool,
    pub buzzer_phase: bool,
}

#[derive(Debug)]
struct Outputs {
    solenoid: Box<dyn OutputLine>,
    green: Box<dyn OutputLine>,
    red: Box<dyn OutputLine>,
    orange: Box<dyn OutputLine>,
    solenoid_locked: bool,
    light: LightState,
}

#[derive(Debug)]
struct Buzzer {
    line: Box<dyn OutputLine>,
    /// Generation of the toggling task currently allowed to drive the line
    owner: Option<u64>,
    generation: u64,
    phase: bool,
    task: Option<JoinHandle<()>>,
    tasks_spawned: u64,
}

/// The process-wide output panel
///
/// Setters are idempotent and always rewrite the hardware level. Lock
/// poisoning is recovered so the outputs stay drivable after a panic
/// elsewhere in the process.
#[derive(Debug)]
pub struct ActuatorPanel {
    outputs: Mutex<Outputs>,
    buzzer: Arc<Mutex<Buzzer>>,
    buzzer_interval: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn drive(line: &dyn OutputLine, high: bool) {
    if let Err(e) = line.set(high) {
        warn!("Output write failed: {}", e);
    }
}

impl ActuatorPanel {
    /// Take ownership of the output lines; nothing is written until
    /// [`ActuatorPanel::initialize`]
    pub fn new(lines: ActuatorLines, buzzer_interval: Duration) -> Self {
        let ActuatorLines {
            solenoid,
            green,
            red,
            orange,
            buzzer,
        } = lines;

        Self {
            outputs: Mutex::new(Outputs {
                solenoid,
                green,
                red,
                orange,
                solenoid_locked: false,
                light: LightState::Standby,
            }),
            buzzer: Arc::new(Mutex::new(Buzzer {
                line: buzzer,
                owner: None,
                generation: 0,
                phase: false,
                task: None,
                tasks_spawned: 0,
            })),
            buzzer_interval,
        }
    }

    /// Startup state: locked, standby lights, buzzer low
    pub fn initialize(&self) {
        {
            let buzzer = lock(&self.buzzer);
            drive(buzzer.line.as_ref(), false);
        }
        self.set_solenoid_locked(true);
        self.set_lights(LightState::Standby);
        info!("Actuator panel initialized: locked, standby, buzzer off");
    }

    pub fn set_solenoid_locked(&self, locked: bool) {
        let mut outputs = lock(&self.outputs);
        // energize to lock
        drive(outputs.solenoid.as_ref(), locked);
        if outputs.solenoid_locked != locked {
            info!("Door solenoid {}", if locked { "locked" } else { "unlocked" });
        }
        outputs.solenoid_locked = locked;
    }

    pub fn set_lights(&self, light: LightState) {
        let mut outputs = lock(&self.outputs);
        let (green, red, orange) = light.levels();
        drive(outputs.green.as_ref(), green);
        drive(outputs.red.as_ref(), red);
        drive(outputs.orange.as_ref(), orange);
        if outputs.light != light {
            debug!("Lights {:?} -> {:?}", outputs.light, light);
        }
        outputs.light = light;
    }

    /// Start or stop the buzzer. Returns whether anything changed.
    ///
    /// Activation spawns at most one toggling task. Deactivation drives the
    /// line low before returning, whatever phase the task was in.
    pub fn set_buzzer_active(&self, active: bool) -> bool {
        if active {
            self.start_buzzer()
        } else {
            self.stop_buzzer()
        }
    }

    fn start_buzzer(&self) -> bool {
        let mut buzzer = lock(&self.buzzer);
        if buzzer.owner.is_some() {
            return false;
        }
        buzzer.generation += 1;
        let generation = buzzer.generation;
        buzzer.owner = Some(generation);
        buzzer.phase = false;
        buzzer.tasks_spawned += 1;
        buzzer.task = Some(tokio::spawn(toggle_buzzer(
            Arc::clone(&self.buzzer),
            generation,
            self.buzzer_interval,
        )));
        info!("Buzzer started");
        true
    }

    fn stop_buzzer(&self) -> bool {
        let task = {
            let mut buzzer = lock(&self.buzzer);
            if buzzer.owner.take().is_none() {
                return false;
            }
            buzzer.phase = false;
            drive(buzzer.line.as_ref(), false);
            buzzer.task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
        info!("Buzzer stopped");
        true
    }

    pub fn buzzer_active(&self) -> bool {
        lock(&self.buzzer).owner.is_some()
    }

    /// Toggling tasks spawned since startup
    pub fn buzzer_tasks_spawned(&self) -> u64 {
        lock(&self.buzzer).tasks_spawned
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        let (solenoid_locked, light) = {
            let outputs = lock(&self.outputs);
            (outputs.solenoid_locked, outputs.light)
        };
        let buzzer = lock(&self.buzzer);
        PanelSnapshot {
            solenoid_locked,
            light,
            buzzer_active: buzzer.owner.is_some(),
            buzzer_phase: buzzer.phase,
        }
    }

    /// Teardown: buzzer off, every line handed back
    pub fn release(&self) {
        self.stop_buzzer();
        {
            let buzzer = lock(&self.buzzer);
            if let Err(e) = buzzer.line.release() {
                warn!("Failed to release buzzer line: {}", e);
            }
        }
        let outputs = lock(&self.outputs);
        for line in [&outputs.solenoid, &outputs.green, &outputs.red, &outputs.orange] {
            if let Err(e) = line.release() {
                warn!("Failed to release output line: {}", e);
            }
        }
        info!("Actuator panel released");
    }
}

/// Drives the buzzer line low when the toggling task ends, however it ends,
/// unless a newer task already owns the line
struct BuzzerGuard {
    buzzer: Arc<Mutex<Buzzer>>,
    generation: u64,
}

impl Drop for BuzzerGuard {
    fn drop(&mut self) {
        let mut buzzer = lock(&self.buzzer);
        match buzzer.owner {
            Some(owner) if owner != self.generation => {}
            _ => {
                buzzer.phase = false;
                drive(buzzer.line.as_ref(), false);
            }
        }
    }
}

async fn toggle_buzzer(buzzer: Arc<Mutex<Buzzer>>, generation: u64, interval: Duration) {
    let _guard = BuzzerGuard {
        buzzer: Arc::clone(&buzzer),
        generation,
    };

    loop {
        {
            let mut state = lock(&buzzer);
            if state.owner != Some(generation) {
                break;
            }
            state.phase = !state.phase;
            let level = state.phase;
            drive(state.line.as_ref(), level);
        }
        sleep(interval).await;
    }
    debug!("Buzzer task {} exited", generation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimulatedPanel;

    fn panel() -> (ActuatorPanel, SimulatedPanel) {
        let sim = SimulatedPanel::new();
        let panel = ActuatorPanel::new(sim.lines().actuators, Duration::from_secs(1));
        panel.initialize();
        (panel, sim)
    }

    #[tokio::test(start_paused = true)]
    async fn initializes_locked_standby_silent() {
        let (panel, sim) = panel();
        let snap = panel.snapshot();
        assert!(snap.solenoid_locked);
        assert_eq!(snap.light, LightState::Standby);
        assert!(!snap.buzzer_active);
        assert!(sim.solenoid.level());
        assert!(sim.orange.level());
        assert!(!sim.green.level());
        assert!(!sim.buzzer.level());
    }

    #[tokio::test(start_paused = true)]
    async fn light_states_map_to_tower_lines() {
        let (panel, sim) = panel();

        panel.set_lights(LightState::Running);
        assert_eq!((sim.green.level(), sim.red.level(), sim.orange.level()), (true, false, false));

        panel.set_lights(LightState::Done);
        assert_eq!((sim.green.level(), sim.red.level(), sim.orange.level()), (false, true, true));

        panel.set_lights(LightState::EmergencyStop);
        assert_eq!((sim.green.level(), sim.red.level(), sim.orange.level()), (true, true, true));
    }

    #[tokio::test(start_paused = true)]
    async fn double_activation_spawns_one_task() {
        let (panel, _sim) = panel();
        assert!(panel.set_buzzer_active(true));
        assert!(!panel.set_buzzer_active(true));
        assert_eq!(panel.buzzer_tasks_spawned(), 1);
        assert!(panel.buzzer_active());
    }

    #[tokio::test(start_paused = true)]
    async fn buzzer_toggles_once_per_interval() {
        let (panel, sim) = panel();
        sim.buzzer.clear_writes();

        panel.set_buzzer_active(true);
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(sim.buzzer.writes(), vec![true, false, true]);
        assert!(sim.buzzer.level());
    }

    #[tokio::test(start_paused = true)]
    async fn deactivation_forces_line_low_in_high_phase() {
        let (panel, sim) = panel();
        panel.set_buzzer_active(true);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(sim.buzzer.level());

        assert!(panel.set_buzzer_active(false));
        assert!(!sim.buzzer.level());

        sim.buzzer.clear_writes();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sim.buzzer.count_writes(true), 0);
        assert!(!sim.buzzer.level());
    }

    #[tokio::test(start_paused = true)]
    async fn deactivation_in_low_phase_stays_low() {
        let (panel, sim) = panel();
        panel.set_buzzer_active(true);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!sim.buzzer.level());

        panel.set_buzzer_active(false);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!sim.buzzer.level());
        assert!(!panel.snapshot().buzzer_active);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop_runs_a_single_task() {
        let (panel, sim) = panel();
        panel.set_buzzer_active(true);
        tokio::time::sleep(Duration::from_millis(200)).await;
        panel.set_buzzer_active(false);
        panel.set_buzzer_active(true);
        assert_eq!(panel.buzzer_tasks_spawned(), 2);

        sim.buzzer.clear_writes();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        // one task toggling: strictly alternating levels
        let writes = sim.buzzer.writes();
        assert!(writes.windows(2).all(|w| w[0] != w[1]), "{:?}", writes);
    }

    #[tokio::test(start_paused = true)]
    async fn release_silences_buzzer() {
        let (panel, sim) = panel();
        panel.set_buzzer_active(true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        panel.release();
        assert!(!sim.buzzer.level());
        assert!(!panel.buzzer_active());
        for line in [&sim.solenoid, &sim.green, &sim.red, &sim.orange, &sim.buzzer] {
            assert!(line.is_released(), "{} not released", line.name());
        }
    }
}
