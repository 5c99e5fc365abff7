//! Command line / environment surface of the simulator binary.

use crate::config::{Config, ConfigError, load_config};
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

/// Matachana 130HPO sterilizer simulator
#[derive(Parser, Debug, Default)]
#[command(name = "matachana-sim", version, about = "Virtual Matachana 130HPO sterilizer for integration testing.")]
pub struct Cli {
    /// Path to a TOML config file (defaults are used when omitted)
    #[arg(short, long, env = "MATACHANA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address both listeners bind to
    #[arg(long, env = "MATACHANA_BIND_ADDRESS")]
    pub bind_address: Option<IpAddr>,

    /// Control API port
    #[arg(long, env = "MATACHANA_API_PORT")]
    pub api_port: Option<u16>,

    /// Telemetry port
    #[arg(long, env = "MATACHANA_TELEMETRY_PORT")]
    pub telemetry_port: Option<u16>,

    /// Cycle engine tick interval in milliseconds
    #[arg(long, env = "MATACHANA_TICK_INTERVAL_MS")]
    pub tick_interval_ms: Option<u64>,

    /// Simulated seconds per wall-clock second
    #[arg(long, env = "MATACHANA_SPEED_FACTOR")]
    pub speed_factor: Option<f64>,

    /// Chance of a random alarm at the end of each phase (0.0 - 1.0)
    #[arg(long, env = "MATACHANA_FAULT_PROBABILITY")]
    pub fault_probability: Option<f64>,

    /// Sensor noise amplitude (0 disables noise)
    #[arg(long, env = "MATACHANA_SENSOR_NOISE")]
    pub sensor_noise: Option<f64>,

    /// Seed for the simulator's random source
    #[arg(long, env = "MATACHANA_SEED")]
    pub seed: Option<u64>,

    /// Start cycles automatically after a random idle wait
    #[arg(long, env = "MATACHANA_AUTO_CYCLE")]
    pub auto_cycle: Option<bool>,

    #[arg(long, env = "MATACHANA_MIN_WAIT_SECONDS")]
    pub min_wait_seconds: Option<u64>,

    #[arg(long, env = "MATACHANA_MAX_WAIT_SECONDS")]
    pub max_wait_seconds: Option<u64>,

    #[arg(long, env = "MATACHANA_TARGET_TEMPERATURE_C")]
    pub target_temperature_c: Option<f64>,

    #[arg(long, env = "MATACHANA_PREPARING_SECONDS")]
    pub preparing_seconds: Option<f64>,

    #[arg(long, env = "MATACHANA_HEATING_SECONDS")]
    pub heating_seconds: Option<f64>,

    #[arg(long, env = "MATACHANA_STERILIZING_SECONDS")]
    pub sterilizing_seconds: Option<f64>,

    #[arg(long, env = "MATACHANA_COOLING_SECONDS")]
    pub cooling_seconds: Option<f64>,

    /// Serial number reported by the device
    #[arg(long, env = "MATACHANA_SERIAL_NUMBER")]
    pub serial_number: Option<String>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "MATACHANA_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Build the effective configuration: defaults, then the config file, then flags.
    pub fn resolve_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => Config::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut Config) {
        fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }
        set(&mut config.server.bind_address, &self.bind_address);
        set(&mut config.server.api_port, &self.api_port);
        set(&mut config.server.telemetry_port, &self.telemetry_port);

        let sim = &mut config.simulation;
        set(&mut sim.tick_interval_ms, &self.tick_interval_ms);
        set(&mut sim.speed_factor, &self.speed_factor);
        set(&mut sim.fault_probability, &self.fault_probability);
        set(&mut sim.sensor_noise, &self.sensor_noise);
        set(&mut sim.auto_cycle, &self.auto_cycle);
        set(&mut sim.min_wait_seconds, &self.min_wait_seconds);
        set(&mut sim.max_wait_seconds, &self.max_wait_seconds);
        if self.seed.is_some() {
            sim.seed = self.seed;
        }

        let cycle = &mut config.cycle;
        set(&mut cycle.target_temperature_c, &self.target_temperature_c);
        set(&mut cycle.preparing_seconds, &self.preparing_seconds);
        set(&mut cycle.heating_seconds, &self.heating_seconds);
        set(&mut cycle.sterilizing_seconds, &self.sterilizing_seconds);
        set(&mut cycle.cooling_seconds, &self.cooling_seconds);

        set(&mut config.device.serial_number, &self.serial_number);
        set(&mut config.logging.level, &self.log_level);
    }
}
