//! Oven Timer - a door-interlocked oven timer controller
//!
//! This is the main entry point for the oven-timer application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use oven_timer::{
    api::create_router,
    config::{Backend, Config},
    hardware::{PanelLines, SimulatedPanel},
    services::check_systemctl_available,
    state::AppState,
    tasks::safety_monitor_task,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("oven_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting oven-timer v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, backend={:?}, estop={:?}, unlock={:?}",
        config.host, config.port, config.backend, config.estop_polarity, config.unlock_policy
    );

    // Reboot and poweroff need systemctl; the controller itself does not
    if let Err(e) = check_systemctl_available().await {
        warn!("{}", e);
    }

    let (lines, simulator) = match config.backend {
        Backend::Simulated => {
            let simulator = SimulatedPanel::new();
            (simulator.lines(), Some(simulator))
        }
        Backend::Sysfs => (config.pin_map().open_sysfs()?, None),
    };
    let PanelLines { actuators, estop } = lines;

    // Create application state
    let mut state = AppState::new(
        config.controller_settings(),
        actuators,
        config.host.clone(),
        config.port,
    );
    if let Some(simulator) = simulator {
        state = state.with_simulator(simulator);
    }
    let state = Arc::new(state);

    // Start the emergency-stop monitor
    let monitor = tokio::spawn(safety_monitor_task(
        Arc::clone(&state),
        estop,
        config.poll_interval(),
    ));

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /timers/:id/start        - Start a timer");
    info!("  POST /timers/:id/acknowledge  - Silence a finished timer");
    info!("  POST /timers/:id/reset        - Reset an acknowledged timer");
    info!("  POST /timers/:id/adjust       - Adjust preset (maintenance)");
    info!("  POST /timers/:id/rename       - Rename timer (maintenance)");
    info!("  POST /maintenance/enter|exit  - Maintenance mode");
    info!("  POST /door/unlock             - Release the door");
    info!("  GET  /status                  - Controller status");
    info!("  GET  /health                  - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);
    let exit_rx = state.exit_tx.subscribe();

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal(exit_rx) => {
            info!("Shutdown signal received");
        }
    }

    // Stop the monitor (it releases the sensor) before the outputs go away
    state.exit_tx.send_replace(true);
    if let Err(e) = monitor.await {
        warn!("Safety monitor ended abnormally: {}", e);
    }
    state.shutdown();
    info!("Server shutdown complete");
    Ok(())
}
