//! Host power operations behind the operator's reboot and shutdown buttons

use tokio::process::Command;
use tracing::info;

/// Power action understood by `systemctl`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Reboot,
    Poweroff,
}

impl PowerAction {
    fn verb(self) -> &'static str {
        match self {
            PowerAction::Reboot => "reboot",
            PowerAction::Poweroff => "poweroff",
        }
    }
}

/// Execute a host power action
pub async fn execute_power_action(action: PowerAction) -> Result<(), String> {
    info!("Executing system {}", action.verb());

    let output = Command::new("systemctl")
        .args(&[action.verb()])
        .output()
        .await
        .map_err(|e| format!("Failed to execute systemctl {}: {}", action.verb(), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("systemctl {} failed: {}", action.verb(), stderr));
    }

    info!("System {} command executed", action.verb());
    Ok(())
}

/// Check if systemctl is available on the system
pub async fn check_systemctl_available() -> Result<(), String> {
    Command::new("systemctl")
        .arg("--version")
        .output()
        .await
        .map_err(|_| "systemctl is not available; reboot and poweroff will fail".to_string())?;

    info!("systemctl is available");
    Ok(())
}
