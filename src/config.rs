//! # Simulator configuration
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional TOML file, then environment variables / command line flags
//! (see [`crate::cli::Cli`]).
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [server]
//! bind_address = "10.0.0.21"
//! api_port = 8000
//! telemetry_port = 8001
//!
//! [simulation]
//! tick_interval_ms = 1000
//! speed_factor = 10.0
//! fault_probability = 0.05
//!
//! [cycle]
//! target_temperature_c = 55.0
//! heating_seconds = 90
//! ```
//!
//! Missing sections and fields fall back to their defaults, so an empty
//! file is a valid configuration.

use matachana_device::{AutoCycle, EngineSettings, Parameters};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Largest accepted `simulation.speed_factor`.
pub const MAX_SPEED_FACTOR: f64 = 1e6;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
    #[serde(default)]
    pub device: DeviceInfoConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listen addresses of the two protocol surfaces.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_telemetry_port")]
    pub telemetry_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_port: default_api_port(),
            telemetry_port: default_telemetry_port(),
        }
    }
}

impl ServerConfig {
    pub fn api_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.api_port)
    }

    pub fn telemetry_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.telemetry_port)
    }
}

/// Tick source and randomness of the simulated device.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Simulated seconds per wall-clock second.
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,
    #[serde(default)]
    pub fault_probability: f64,
    #[serde(default)]
    pub sensor_noise: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub auto_cycle: bool,
    #[serde(default = "default_min_wait_seconds")]
    pub min_wait_seconds: u64,
    #[serde(default = "default_max_wait_seconds")]
    pub max_wait_seconds: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            speed_factor: default_speed_factor(),
            fault_probability: 0.0,
            sensor_noise: 0.0,
            seed: None,
            auto_cycle: false,
            min_wait_seconds: default_min_wait_seconds(),
            max_wait_seconds: default_max_wait_seconds(),
        }
    }
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            fault_probability: self.fault_probability,
            sensor_noise: self.sensor_noise,
            seed: self.seed,
            auto_cycle: self.auto_cycle.then(|| AutoCycle {
                min_wait: Duration::from_secs(self.min_wait_seconds),
                max_wait: Duration::from_secs(self.max_wait_seconds),
            }),
        }
    }
}

/// Power-on values of the client-settable cycle parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CycleConfig {
    #[serde(default = "default_target_temperature_c")]
    pub target_temperature_c: f64,
    #[serde(default = "default_preparing_seconds")]
    pub preparing_seconds: f64,
    #[serde(default = "default_heating_seconds")]
    pub heating_seconds: f64,
    #[serde(default = "default_sterilizing_seconds")]
    pub sterilizing_seconds: f64,
    #[serde(default = "default_cooling_seconds")]
    pub cooling_seconds: f64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            target_temperature_c: default_target_temperature_c(),
            preparing_seconds: default_preparing_seconds(),
            heating_seconds: default_heating_seconds(),
            sterilizing_seconds: default_sterilizing_seconds(),
            cooling_seconds: default_cooling_seconds(),
        }
    }
}

impl CycleConfig {
    pub fn parameters(&self) -> Parameters {
        Parameters {
            target_temperature_c: self.target_temperature_c,
            preparing_seconds: self.preparing_seconds,
            heating_seconds: self.heating_seconds,
            sterilizing_seconds: self.sterilizing_seconds,
            cooling_seconds: self.cooling_seconds,
        }
    }
}

/// Identity reported by `/info` and the telemetry info gauge.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceInfoConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_serial_number")]
    pub serial_number: String,
}

impl Default for DeviceInfoConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            serial_number: default_serial_number(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Reject settings the simulator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if sim.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "simulation.tick_interval_ms must be greater than 0".to_string(),
            ));
        }
        if !sim.speed_factor.is_finite()
            || sim.speed_factor <= 0.0
            || sim.speed_factor > MAX_SPEED_FACTOR
        {
            return Err(ConfigError::Invalid(format!(
                "simulation.speed_factor must be greater than 0 and at most {}, got {}",
                MAX_SPEED_FACTOR, sim.speed_factor
            )));
        }
        if !(0.0..=1.0).contains(&sim.fault_probability) {
            return Err(ConfigError::Invalid(format!(
                "simulation.fault_probability must be between 0 and 1, got {}",
                sim.fault_probability
            )));
        }
        if !sim.sensor_noise.is_finite() || sim.sensor_noise < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "simulation.sensor_noise must be zero or positive, got {}",
                sim.sensor_noise
            )));
        }
        if sim.min_wait_seconds > sim.max_wait_seconds {
            return Err(ConfigError::Invalid(format!(
                "simulation.min_wait_seconds ({}) exceeds max_wait_seconds ({})",
                sim.min_wait_seconds, sim.max_wait_seconds
            )));
        }
        let server = &self.server;
        if server.api_port != 0 && server.api_port == server.telemetry_port {
            return Err(ConfigError::Invalid(format!(
                "server.api_port and server.telemetry_port are both {}",
                server.api_port
            )));
        }
        self.cycle
            .parameters()
            .validate_all()
            .map_err(|e| ConfigError::Invalid(format!("cycle: {}", e)))?;
        Ok(())
    }
}

fn default_bind_address() -> IpAddr { IpAddr::V4(Ipv4Addr::UNSPECIFIED) }
fn default_api_port() -> u16 { 8000 }
fn default_telemetry_port() -> u16 { 8001 }
fn default_tick_interval_ms() -> u64 { 1000 }
fn default_speed_factor() -> f64 { 1.0 }
fn default_min_wait_seconds() -> u64 { 360 }
fn default_max_wait_seconds() -> u64 { 600 }
fn default_target_temperature_c() -> f64 { Parameters::default().target_temperature_c }
fn default_preparing_seconds() -> f64 { Parameters::default().preparing_seconds }
fn default_heating_seconds() -> f64 { Parameters::default().heating_seconds }
fn default_sterilizing_seconds() -> f64 { Parameters::default().sterilizing_seconds }
fn default_cooling_seconds() -> f64 { Parameters::default().cooling_seconds }
fn default_model() -> String { "Matachana 130HPO".to_string() }
fn default_serial_number() -> String { "SIM-0001".to_string() }
fn default_log_level() -> String { "info".to_string() }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path.display(), e);
            Err(ConfigError::Io(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.server.api_port, 8000);
        assert_eq!(config.server.telemetry_port, 8001);
        assert_eq!(config.server.bind_address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.simulation.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.simulation.speed_factor, 1.0);
        assert_eq!(config.cycle.parameters(), Parameters::default());
        assert!(config.simulation.engine_settings().auto_cycle.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_success() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("sim.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(
            file,
            "[server]\nbind_address = '127.0.0.2'\napi_port = 9000\n\n[cycle]\nheating_seconds = 45.0"
        )
        .unwrap();
        file.flush().unwrap();
        let config = load_config(&file_path).unwrap();
        assert_eq!(config.server.api_addr(), "127.0.0.2:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.server.telemetry_port, 8001);
        assert_eq!(config.cycle.heating_seconds, 45.0);
        // Defaults for missing fields
        assert_eq!(config.cycle.cooling_seconds, 120.0);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent_file.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("bad.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "not a valid toml").unwrap();
        file.flush().unwrap();
        let result = load_config(&file_path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_auto_cycle_settings() {
        let config: Config = toml::from_str(
            "[simulation]\nauto_cycle = true\nmin_wait_seconds = 10\nmax_wait_seconds = 20\nseed = 4",
        )
        .unwrap();
        let settings = config.simulation.engine_settings();
        let auto = settings.auto_cycle.unwrap();
        assert_eq!(auto.min_wait, Duration::from_secs(10));
        assert_eq!(auto.max_wait, Duration::from_secs(20));
        assert_eq!(settings.seed, Some(4));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = Config::default();
        config.simulation.tick_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.simulation.fault_probability = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.simulation.speed_factor = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.simulation.speed_factor = 1e20;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.simulation.speed_factor = MAX_SPEED_FACTOR;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.server.telemetry_port = config.server.api_port;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.simulation.min_wait_seconds = 700;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.cycle.target_temperature_c = 200.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_ephemeral_ports_may_repeat() {
        let mut config = Config::default();
        config.server.api_port = 0;
        config.server.telemetry_port = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("matachana.toml");
        let config = load_config(&path).unwrap();
        let defaults = Config::default();
        assert_eq!(config.server.api_addr(), defaults.server.api_addr());
        assert_eq!(config.server.telemetry_addr(), defaults.server.telemetry_addr());
        assert_eq!(config.cycle.parameters(), defaults.cycle.parameters());
        assert_eq!(config.simulation.engine_settings(), defaults.simulation.engine_settings());
        assert_eq!(config.device.serial_number, defaults.device.serial_number);
        assert!(config.validate().is_ok());
    }
}
