//! Cycle parameters settable by clients while the device is idle.

use crate::error::DeviceError;
use crate::phase::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const TARGET_TEMPERATURE_C: &str = "targetTemperatureC";
pub const PREPARING_SECONDS: &str = "preparingSeconds";
pub const HEATING_SECONDS: &str = "heatingSeconds";
pub const STERILIZING_SECONDS: &str = "sterilizingSeconds";
pub const COOLING_SECONDS: &str = "coolingSeconds";

/// Every parameter name accepted by [`Parameters::set`].
pub const PARAMETER_NAMES: [&str; 5] = [
    TARGET_TEMPERATURE_C,
    PREPARING_SECONDS,
    HEATING_SECONDS,
    STERILIZING_SECONDS,
    COOLING_SECONDS,
];

pub const MIN_TARGET_TEMPERATURE_C: f64 = 30.0;
pub const MAX_TARGET_TEMPERATURE_C: f64 = 80.0;
pub const MAX_PHASE_SECONDS: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    pub target_temperature_c: f64,
    pub preparing_seconds: f64,
    pub heating_seconds: f64,
    pub sterilizing_seconds: f64,
    pub cooling_seconds: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            target_temperature_c: 50.0,
            preparing_seconds: 30.0,
            heating_seconds: 120.0,
            sterilizing_seconds: 240.0,
            cooling_seconds: 120.0,
        }
    }
}

impl Parameters {
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            TARGET_TEMPERATURE_C => Some(self.target_temperature_c),
            PREPARING_SECONDS => Some(self.preparing_seconds),
            HEATING_SECONDS => Some(self.heating_seconds),
            STERILIZING_SECONDS => Some(self.sterilizing_seconds),
            COOLING_SECONDS => Some(self.cooling_seconds),
            _ => None,
        }
    }

    /// Validate and store a single value. Leaves `self` untouched on error.
    pub fn set(&mut self, name: &str, value: f64) -> Result<(), DeviceError> {
        Self::validate(name, value)?;
        let slot = match name {
            TARGET_TEMPERATURE_C => &mut self.target_temperature_c,
            PREPARING_SECONDS => &mut self.preparing_seconds,
            HEATING_SECONDS => &mut self.heating_seconds,
            STERILIZING_SECONDS => &mut self.sterilizing_seconds,
            COOLING_SECONDS => &mut self.cooling_seconds,
            _ => return Err(DeviceError::UnknownParameter(name.to_string())),
        };
        *slot = value;
        Ok(())
    }

    pub fn validate(name: &str, value: f64) -> Result<(), DeviceError> {
        if !PARAMETER_NAMES.contains(&name) {
            return Err(DeviceError::UnknownParameter(name.to_string()));
        }
        let invalid = |reason: String| DeviceError::InvalidParameterValue {
            name: name.to_string(),
            value,
            reason,
        };
        if !value.is_finite() {
            return Err(invalid("value must be finite".to_string()));
        }
        if name == TARGET_TEMPERATURE_C {
            if !(MIN_TARGET_TEMPERATURE_C..=MAX_TARGET_TEMPERATURE_C).contains(&value) {
                return Err(invalid(format!(
                    "must be between {MIN_TARGET_TEMPERATURE_C} and {MAX_TARGET_TEMPERATURE_C}"
                )));
            }
        } else if value <= 0.0 || value > MAX_PHASE_SECONDS {
            return Err(invalid(format!(
                "must be greater than 0 and at most {MAX_PHASE_SECONDS}"
            )));
        }
        Ok(())
    }

    /// Validate every value in the struct, e.g. defaults loaded from a config file.
    pub fn validate_all(&self) -> Result<(), DeviceError> {
        self.iter()
            .try_for_each(|(name, value)| Self::validate(name, value))
    }

    /// Apply a batch of updates. Either every entry is applied or none is.
    pub fn merge(&mut self, updates: &BTreeMap<String, f64>) -> Result<(), DeviceError> {
        let mut staged = self.clone();
        for (name, value) in updates {
            staged.set(name, *value)?;
        }
        *self = staged;
        Ok(())
    }

    /// Configured duration of a running phase.
    pub fn phase_duration(&self, phase: Phase) -> Option<Duration> {
        let seconds = match phase {
            Phase::Preparing => self.preparing_seconds,
            Phase::Heating => self.heating_seconds,
            Phase::Sterilizing => self.sterilizing_seconds,
            Phase::Cooling => self.cooling_seconds,
            Phase::Idle | Phase::Complete | Phase::Fault => return None,
        };
        Some(Duration::from_secs_f64(seconds))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        PARAMETER_NAMES
            .iter()
            .filter_map(|name| self.get(name).map(|value| (*name, value)))
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }
}
