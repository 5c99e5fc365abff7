//! Shared handle to the single simulated device of a process.
//!
//! Handlers on both ports and the tick task hold clones of [`Device`].
//! Commands and ticks take the write lock, so at most one mutation runs at
//! a time; reads take the read lock and clone the state, so a snapshot is
//! always the result of a completed command or tick.

use crate::command::Command;
use crate::engine::{CycleEngine, TickReport};
use crate::error::DeviceError;
use crate::state::DeviceState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct Device {
    engine: Arc<RwLock<CycleEngine>>,
}

impl Device {
    pub fn new(engine: CycleEngine) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
        }
    }

    /// Immutable snapshot of the current state.
    pub async fn read(&self) -> DeviceState {
        self.engine.read().await.snapshot()
    }

    /// Validate and execute a command, returning the state it produced.
    pub async fn apply(&self, command: Command) -> Result<DeviceState, DeviceError> {
        self.engine.write().await.apply(command)
    }

    pub async fn tick(&self, dt: Duration) -> TickReport {
        self.engine.write().await.tick(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSettings;
    use crate::parameters::Parameters;
    use crate::phase::Phase;

    #[tokio::test]
    async fn test_clones_share_state() {
        let device = Device::new(CycleEngine::new(
            Parameters::default(),
            EngineSettings::default(),
        ));
        let other = device.clone();
        device.apply(Command::Start).await.unwrap();
        assert_eq!(other.read().await.phase, Phase::Preparing);
        other.tick(Duration::from_secs(30)).await;
        assert_eq!(device.read().await.phase, Phase::Heating);
    }
}
