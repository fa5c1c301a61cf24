//! Per-timer countdown task

use std::sync::Arc;
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant},
};
use tracing::debug;

use crate::state::{AppState, TickOutcome};

/// Spawn the countdown for one run of timer `id`
///
/// The first step lands one interval after the start, then one per interval
/// until the run completes or is superseded.
pub fn spawn_countdown(state: Arc<AppState>, id: usize, run_id: u64) -> JoinHandle<()> {
    tokio::spawn(countdown_task(state, id, run_id))
}

async fn countdown_task(state: Arc<AppState>, id: usize, run_id: u64) {
    let period = state.countdown_interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    debug!("Countdown for timer {} (run {}) started", id, run_id);

    loop {
        ticker.tick().await;
        match state.countdown_step(id, run_id) {
            TickOutcome::Continue => {}
            TickOutcome::Completed => {
                debug!("Countdown for timer {} (run {}) completed", id, run_id);
                break;
            }
            TickOutcome::Stopped => {
                debug!("Countdown for timer {} (run {}) cancelled", id, run_id);
                break;
            }
        }
    }
}
