//! Command validation errors raised by the device model.

use crate::phase::Phase;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("cannot {command} while device is {phase}")]
    InvalidState { command: &'static str, phase: Phase },
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),
    #[error("invalid value {value} for parameter {name}: {reason}")]
    InvalidParameterValue {
        name: String,
        value: f64,
        reason: String,
    },
}

impl DeviceError {
    /// Stable error kind reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceError::InvalidState { .. } => "InvalidStateError",
            DeviceError::UnknownParameter(_) => "UnknownParameterError",
            DeviceError::InvalidParameterValue { .. } => "InvalidParameterValueError",
        }
    }
}
