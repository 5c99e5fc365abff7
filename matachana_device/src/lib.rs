// matachana_device: state model and cycle engine shared by the simulator host and harness

pub mod clock;
pub mod command;
pub mod device;
pub mod engine;
pub mod error;
pub mod parameters;
pub mod phase;
pub mod sensors;
pub mod state;

pub use command::Command;
pub use device::Device;
pub use engine::{AutoCycle, CycleEngine, EngineSettings, PhaseChange, TickReport};
pub use error::DeviceError;
pub use parameters::Parameters;
pub use phase::Phase;
pub use sensors::SensorReadings;
pub use state::DeviceState;
