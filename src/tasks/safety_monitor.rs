//! Emergency-stop polling task

use std::{sync::Arc, time::Duration};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{hardware::InputLine, state::AppState};

/// Failures between repeated error reports while the sensor stays unreadable
const FAULT_REPORT_EVERY: u64 = 25;

/// Poll the emergency-stop input until the controller exits
///
/// Read failures are logged and retried on the next poll. Once the exit
/// flag on [`AppState::exit_tx`] is set the task releases the sensor line
/// and returns, so no edge is handled after the outputs are torn down.
pub async fn safety_monitor_task(
    state: Arc<AppState>,
    sensor: Box<dyn InputLine>,
    poll: Duration,
) {
    info!("Starting safety monitor task ({}ms poll)", poll.as_millis());

    let mut exit_rx = state.exit_tx.subscribe();
    let mut ticker = interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures: u64 = 0;

    loop {
        tokio::select! {
            _ = exit_rx.wait_for(|exit| *exit) => break,
            _ = ticker.tick() => {}
        }

        match sensor.read() {
            Ok(level) => {
                if consecutive_failures > 0 {
                    info!(
                        "Emergency-stop sensor readable again after {} failed polls",
                        consecutive_failures
                    );
                    consecutive_failures = 0;
                }
                state.observe_estop(level);
            }
            Err(e) => {
                consecutive_failures += 1;
                let total = state.note_sensor_fault();
                if consecutive_failures == 1 {
                    warn!("Emergency-stop sensor read failed: {}", e);
                } else if consecutive_failures % FAULT_REPORT_EVERY == 0 {
                    error!(
                        "Emergency-stop sensor unreadable for {} polls ({} faults total): {}",
                        consecutive_failures, total, e
                    );
                }
            }
        }
    }

    debug!("Safety monitor stopping");
    if let Err(e) = sensor.release() {
        warn!("Failed to release emergency-stop line: {}", e);
    }
    info!("Safety monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hardware::SimulatedPanel,
        state::{ControllerSettings, SensorPolarity, UnlockPolicy},
    };

    fn state(polarity: SensorPolarity) -> (Arc<AppState>, SimulatedPanel) {
        let sim = SimulatedPanel::new();
        let settings = ControllerSettings {
            timers: ControllerSettings::factory_timers(),
            maintenance_password: "secret".to_string(),
            polarity,
            unlock_policy: UnlockPolicy::OnAcknowledge,
            countdown_interval: Duration::from_secs(1),
            buzzer_interval: Duration::from_secs(1),
        };
        let state = AppState::new(settings, sim.lines().actuators, "127.0.0.1".to_string(), 0);
        (Arc::new(state), sim)
    }

    #[tokio::test(start_paused = true)]
    async fn trips_and_clears_from_polled_level() {
        let (state, sim) = state(SensorPolarity::ActiveHigh);
        tokio::spawn(safety_monitor_task(
            Arc::clone(&state),
            Box::new(sim.estop.clone()),
            Duration::from_millis(200),
        ));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!state.is_tripped());

        sim.estop.drive(true);
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(state.is_tripped());
        assert_eq!(state.panel.buzzer_tasks_spawned(), 1);

        sim.estop.drive(false);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!state.is_tripped());
        assert!(!state.panel.buzzer_active());
    }

    #[tokio::test(start_paused = true)]
    async fn survives_sensor_read_failures() {
        let (state, sim) = state(SensorPolarity::ActiveHigh);
        tokio::spawn(safety_monitor_task(
            Arc::clone(&state),
            Box::new(sim.estop.clone()),
            Duration::from_millis(200),
        ));

        sim.estop.fail_reads(true);
        sim.estop.drive(true);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(!state.is_tripped());
        assert!(state.snapshot().unwrap().sensor_faults >= 5);

        sim.estop.fail_reads(false);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(state.is_tripped());
    }

    #[tokio::test(start_paused = true)]
    async fn active_low_sensor_trips_on_low_level() {
        let (state, sim) = state(SensorPolarity::ActiveLow);
        sim.estop.drive(true);
        tokio::spawn(safety_monitor_task(
            Arc::clone(&state),
            Box::new(sim.estop.clone()),
            Duration::from_millis(200),
        ));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!state.is_tripped());

        sim.estop.drive(false);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(state.is_tripped());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_and_releases_sensor_on_exit() {
        let (state, sim) = state(SensorPolarity::ActiveHigh);
        let monitor = tokio::spawn(safety_monitor_task(
            Arc::clone(&state),
            Box::new(sim.estop.clone()),
            Duration::from_millis(200),
        ));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!sim.estop.is_released());

        state.request_exit();
        monitor.await.unwrap();
        assert!(sim.estop.is_released());

        // no edge is handled once the monitor is gone
        sim.estop.drive(true);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(!state.is_tripped());
        assert_eq!(state.panel.buzzer_tasks_spawned(), 0);
    }
}
