//! Observable device state. Every snapshot handed to a client is a clone of this.

use crate::parameters::Parameters;
use crate::phase::Phase;
use crate::sensors::SensorReadings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub phase: Phase,
    pub cycle_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Simulated seconds since the cycle started.
    pub elapsed_seconds: f64,
    /// Simulated seconds since the current phase was entered.
    pub phase_elapsed_seconds: f64,
    pub sensor_readings: SensorReadings,
    pub fault_active: bool,
    pub fault_code: Option<String>,
    pub fault_message: Option<String>,
    pub parameters: Parameters,
    pub cycles_completed: u64,
}

impl DeviceState {
    pub fn new(parameters: Parameters) -> Self {
        Self {
            phase: Phase::Idle,
            cycle_id: None,
            started_at: None,
            completed_at: None,
            elapsed_seconds: 0.0,
            phase_elapsed_seconds: 0.0,
            sensor_readings: SensorReadings::baseline(),
            fault_active: false,
            fault_code: None,
            fault_message: None,
            parameters,
            cycles_completed: 0,
        }
    }

    /// Return to idle: no cycle, no fault, baseline readings. Parameters and counters survive.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.cycle_id = None;
        self.started_at = None;
        self.completed_at = None;
        self.elapsed_seconds = 0.0;
        self.phase_elapsed_seconds = 0.0;
        self.sensor_readings = SensorReadings::baseline();
        self.clear_fault();
    }

    pub fn clear_fault(&mut self) {
        self.fault_active = false;
        self.fault_code = None;
        self.fault_message = None;
    }

    pub fn raise_fault(&mut self, code: String, message: String) {
        self.phase = Phase::Fault;
        self.fault_active = true;
        self.fault_code = Some(code);
        self.fault_message = Some(message);
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new(Parameters::default())
    }
}
