//! Configuration and CLI argument handling

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::{
    hardware::PinMap,
    state::{ControllerSettings, SensorPolarity, TimerPreset, UnlockPolicy},
};

/// Where the GPIO lines come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// In-memory lines; the e-stop can be driven through the API
    Simulated,
    /// Linux `/sys/class/gpio`
    Sysfs,
}

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "oven-timer")]
#[command(about = "Oven timer and door interlock controller")]
#[command(version)]
pub struct Config {
    /// Port to bind the operator API to
    #[arg(short, long, default_value = "20560")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Password for maintenance mode
    #[arg(long, env = "OVEN_MAINTENANCE_PASSWORD", hide_env_values = true)]
    pub maintenance_password: String,

    /// Timer as TITLE=SECONDS; repeat for each timer (defaults to the factory set)
    #[arg(long = "timer", value_parser = parse_timer_preset)]
    pub timers: Vec<TimerPreset>,

    /// Sensor level that means the emergency stop is pressed
    #[arg(long, value_enum, default_value = "active-high")]
    pub estop_polarity: SensorPolarity,

    /// When the door is released after a timer finishes
    #[arg(long, value_enum, default_value = "on-acknowledge")]
    pub unlock_policy: UnlockPolicy,

    /// Emergency-stop poll interval in milliseconds
    #[arg(long, default_value = "200", value_parser = clap::value_parser!(u64).range(10..))]
    pub poll_interval_ms: u64,

    /// Buzzer on/off cadence in milliseconds
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(50..))]
    pub buzzer_interval_ms: u64,

    /// GPIO backend
    #[arg(long, value_enum, default_value = "simulated")]
    pub backend: Backend,

    /// Door solenoid output pin (sysfs backend)
    #[arg(long, default_value = "14")]
    pub solenoid_pin: u32,

    /// Green light output pin (sysfs backend)
    #[arg(long, default_value = "15")]
    pub green_pin: u32,

    /// Red light output pin (sysfs backend)
    #[arg(long, default_value = "17")]
    pub red_pin: u32,

    /// Orange light output pin (sysfs backend)
    #[arg(long, default_value = "18")]
    pub orange_pin: u32,

    /// Buzzer output pin (sysfs backend)
    #[arg(long, default_value = "23")]
    pub buzzer_pin: u32,

    /// Emergency-stop input pin (sysfs backend)
    #[arg(long, default_value = "25")]
    pub estop_pin: u32,
}

/// Parse `TITLE=SECONDS`
pub fn parse_timer_preset(raw: &str) -> Result<TimerPreset, String> {
    let (title, seconds) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected TITLE=SECONDS, got {:?}", raw))?;
    let title = title.trim();
    if title.is_empty() {
        return Err("timer title cannot be empty".to_string());
    }
    let seconds = seconds
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid seconds {:?}: {}", seconds, e))?;
    Ok(TimerPreset {
        title: title.to_string(),
        seconds,
    })
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        let timers = if self.timers.is_empty() {
            ControllerSettings::factory_timers()
        } else {
            self.timers.clone()
        };
        ControllerSettings {
            timers,
            maintenance_password: self.maintenance_password.clone(),
            polarity: self.estop_polarity,
            unlock_policy: self.unlock_policy,
            countdown_interval: Duration::from_secs(1),
            buzzer_interval: Duration::from_millis(self.buzzer_interval_ms),
        }
    }

    pub fn pin_map(&self) -> PinMap {
        PinMap {
            solenoid: self.solenoid_pin,
            green: self.green_pin,
            red: self.red_pin,
            orange: self.orange_pin,
            buzzer: self.buzzer_pin,
            estop: self.estop_pin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, clap::Error> {
        let mut argv = vec!["oven-timer", "--maintenance-password", "pw"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv)
    }

    #[test]
    fn defaults_to_factory_timers() {
        let config = parse(&[]).unwrap();
        let settings = config.controller_settings();
        assert_eq!(settings.timers, ControllerSettings::factory_timers());
        assert_eq!(settings.polarity, SensorPolarity::ActiveHigh);
        assert_eq!(settings.unlock_policy, UnlockPolicy::OnAcknowledge);
        assert_eq!(config.poll_interval(), Duration::from_millis(200));
        assert_eq!(config.backend, Backend::Simulated);
    }

    #[test]
    fn timers_and_policies_from_flags() {
        let config = parse(&[
            "--timer",
            "Migne=1800",
            "--timer",
            "Nivio S = 90",
            "--estop-polarity",
            "active-low",
            "--unlock-policy",
            "on-reset",
        ])
        .unwrap();
        let settings = config.controller_settings();
        assert_eq!(
            settings.timers,
            vec![
                TimerPreset {
                    title: "Migne".to_string(),
                    seconds: 1800,
                },
                TimerPreset {
                    title: "Nivio S".to_string(),
                    seconds: 90,
                },
            ]
        );
        assert_eq!(settings.polarity, SensorPolarity::ActiveLow);
        assert_eq!(settings.unlock_policy, UnlockPolicy::OnReset);
    }

    #[test]
    fn rejects_malformed_timers() {
        assert!(parse(&["--timer", "Migne"]).is_err());
        assert!(parse(&["--timer", "=60"]).is_err());
        assert!(parse(&["--timer", "Migne=-5"]).is_err());
    }
}
