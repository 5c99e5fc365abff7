//! Cycle phases of the simulated sterilizer.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    /// Pre-vacuum: chamber is evacuated before heating.
    Preparing,
    Heating,
    Sterilizing,
    /// Cooling and aeration back to atmospheric pressure.
    Cooling,
    Complete,
    Fault,
}

impl Phase {
    /// Phases in the order a cycle walks through them.
    pub const CYCLE: [Phase; 5] = [
        Phase::Preparing,
        Phase::Heating,
        Phase::Sterilizing,
        Phase::Cooling,
        Phase::Complete,
    ];

    /// Next phase of a running cycle, or `None` for phases that do not advance on their own.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Preparing => Some(Phase::Heating),
            Phase::Heating => Some(Phase::Sterilizing),
            Phase::Sterilizing => Some(Phase::Cooling),
            Phase::Cooling => Some(Phase::Complete),
            Phase::Idle | Phase::Complete | Phase::Fault => None,
        }
    }

    /// True while a cycle is in progress and the engine advances it.
    pub fn is_running(self) -> bool {
        self.next().is_some()
    }

    /// A new cycle may only be started from these phases.
    pub fn accepts_start(self) -> bool {
        matches!(self, Phase::Idle | Phase::Complete | Phase::Fault)
    }

    /// Numeric code used by the telemetry gauge.
    pub fn ordinal(self) -> u8 {
        match self {
            Phase::Idle => 0,
            Phase::Preparing => 1,
            Phase::Heating => 2,
            Phase::Sterilizing => 3,
            Phase::Cooling => 4,
            Phase::Complete => 5,
            Phase::Fault => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Preparing => "Preparing",
            Phase::Heating => "Heating",
            Phase::Sterilizing => "Sterilizing",
            Phase::Cooling => "Cooling",
            Phase::Complete => "Complete",
            Phase::Fault => "Fault",
        }
    }

    /// Whether `self -> to` is a legal observable transition.
    pub fn can_transition_to(self, to: Phase) -> bool {
        if self == to {
            return true;
        }
        match to {
            Phase::Idle | Phase::Fault => true,
            Phase::Preparing => self.accepts_start(),
            _ => self.next() == Some(to),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
