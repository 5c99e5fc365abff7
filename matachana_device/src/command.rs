//! Commands accepted by [`crate::engine::CycleEngine::apply`].

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Begin a new cycle.
    Start,
    /// Abort the running cycle and return to idle.
    Abort,
    SetParameter { name: String, value: f64 },
    /// Several parameters at once, applied atomically.
    SetParameters(BTreeMap<String, f64>),
    /// Force the device into the fault state.
    InjectFault { code: String, message: Option<String> },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Abort => "abort",
            Command::SetParameter { .. } | Command::SetParameters(_) => "set parameters",
            Command::InjectFault { .. } => "inject fault",
        }
    }

    pub fn set_parameter(name: impl Into<String>, value: f64) -> Self {
        Command::SetParameter {
            name: name.into(),
            value,
        }
    }

    pub fn inject_fault(code: impl Into<String>) -> Self {
        Command::InjectFault {
            code: code.into(),
            message: None,
        }
    }
}
