//! Contains the data models for API requests and responses.

use crate::config::DeviceInfoConfig;
use chrono::{DateTime, Utc};
use matachana_device::{DeviceState, Phase, SensorReadings};
use serde::{Deserialize, Serialize};

/// Body of a successful command: `{"result": "ok", "status": {...}}`.
#[derive(Serialize, Debug)]
pub struct CommandResponse {
    pub result: &'static str,
    pub status: DeviceState,
}

impl CommandResponse {
    pub fn ok(status: DeviceState) -> Self {
        Self { result: "ok", status }
    }
}

/// Body of a rejected request.
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    /// Error taxonomy name, e.g. `InvalidStateError`.
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeviceState>,
}

/// Request body of `POST /fault`.
#[derive(Deserialize, Debug)]
pub struct FaultRequest {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Identity of the simulated unit.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub manufacturer: &'static str,
    pub model: String,
    pub serial_number: String,
    pub software_version: &'static str,
}

impl From<&DeviceInfoConfig> for DeviceInfo {
    fn from(config: &DeviceInfoConfig) -> Self {
        Self {
            manufacturer: "Matachana",
            model: config.model.clone(),
            serial_number: config.serial_number.clone(),
            software_version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Telemetry frame served on the secondary port.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFrame {
    pub phase: Phase,
    pub cycle_id: Option<String>,
    pub sensor_readings: SensorReadings,
    pub fault_active: bool,
    pub fault_code: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&DeviceState> for TelemetryFrame {
    fn from(state: &DeviceState) -> Self {
        Self {
            phase: state.phase,
            cycle_id: state.cycle_id.clone(),
            sensor_readings: state.sensor_readings,
            fault_active: state.fault_active,
            fault_code: state.fault_code.clone(),
            timestamp: Utc::now(),
        }
    }
}
