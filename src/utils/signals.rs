//! Signal handling for graceful shutdown

use signal_hook_tokio::Signals;
use futures::stream::StreamExt;
use tokio::sync::watch;
use tracing::{error, info};

/// Wait for shutdown signals (SIGTERM, SIGINT) or an operator-confirmed exit
pub async fn shutdown_signal(mut exit_rx: watch::Receiver<bool>) {
    let operator_exit = async move {
        if exit_rx.wait_for(|exit| *exit).await.is_err() {
            // sender gone: nobody can ask for an exit any more
            std::future::pending::<()>().await;
        }
    };

    match Signals::new(&[signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT]) {
        Ok(mut signals) => {
            tokio::select! {
                Some(signal) = signals.next() => info!("Received signal: {}", signal),
                _ = operator_exit => info!("Operator exit confirmed"),
            }
        }
        Err(e) => {
            error!("Failed to create signal handler: {}", e);
            operator_exit.await;
            info!("Operator exit confirmed");
        }
    }
}
