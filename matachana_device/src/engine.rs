//! Cycle engine: owns the device state and advances it through the phase
//! state machine as simulated time passes.
//!
//! Two entry points mutate state:
//!
//! - [`CycleEngine::apply`] validates and executes a client [`Command`].
//! - [`CycleEngine::tick`] advances the simulated clock, moves to the next
//!   phase once the current one has run for its configured duration, and
//!   recomputes the sensor readings.
//!
//! A tick advances at most one phase, so every phase of a cycle is
//! observable in some snapshot. While the device is in [`Phase::Fault`]
//! the engine is halted until an abort or a new start.

use crate::clock::SimClock;
use crate::command::Command;
use crate::error::DeviceError;
use crate::parameters::Parameters;
use crate::phase::Phase;
use crate::sensors::SensorReadings;
use crate::state::DeviceState;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use uuid::Uuid;

/// Alarms the controller can raise on its own at the end of a phase.
pub const ALARM_CODES: [(&str, &str); 3] = [
    ("42", "Pressure drop too slow"),
    ("58", "H2O2 concentration too low"),
    ("101", "Chamber temperature out of range"),
];

pub const INJECTED_FAULT_MESSAGE: &str = "Injected fault";

/// Start a new cycle on its own after a random wait while idle or complete.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoCycle {
    pub min_wait: Duration,
    pub max_wait: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSettings {
    /// Chance of an alarm at the end of each phase, `0.0..=1.0`.
    pub fault_probability: f64,
    /// Sensor noise amplitude; zero keeps readings deterministic.
    pub sensor_noise: f64,
    /// Seed for the engine's random source. Random when `None`.
    pub seed: Option<u64>,
    pub auto_cycle: Option<AutoCycle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub phase_change: Option<PhaseChange>,
    pub auto_started: bool,
}

pub struct CycleEngine {
    state: DeviceState,
    clock: SimClock,
    cycle_started_at: Duration,
    phase_entered_at: Duration,
    // Noise-free readings at phase entry and at the last tick.
    phase_origin: SensorReadings,
    exact: SensorReadings,
    next_auto_start: Option<Duration>,
    settings: EngineSettings,
    rng: StdRng,
}

impl CycleEngine {
    pub fn new(parameters: Parameters, settings: EngineSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut engine = Self {
            state: DeviceState::new(parameters),
            clock: SimClock::new(),
            cycle_started_at: Duration::ZERO,
            phase_entered_at: Duration::ZERO,
            phase_origin: SensorReadings::baseline(),
            exact: SensorReadings::baseline(),
            next_auto_start: None,
            settings,
            rng,
        };
        engine.schedule_auto_start();
        engine
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn snapshot(&self) -> DeviceState {
        self.state.clone()
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Simulated time at which auto-cycle mode will start the next cycle.
    pub fn next_auto_start(&self) -> Option<Duration> {
        self.next_auto_start
    }

    /// Validate and execute `command`. On error the state is left exactly as it was.
    pub fn apply(&mut self, command: Command) -> Result<DeviceState, DeviceError> {
        match command {
            Command::Start => self.start()?,
            Command::Abort => self.abort(),
            Command::SetParameter { name, value } => {
                self.require_idle("set parameters")?;
                self.state.parameters.set(&name, value)?;
                tracing::info!("Parameter {} set to {}", name, value);
            }
            Command::SetParameters(updates) => {
                self.require_idle("set parameters")?;
                self.state.parameters.merge(&updates)?;
                tracing::info!("Updated {} parameter(s): {:?}", updates.len(), updates);
            }
            Command::InjectFault { code, message } => self.inject_fault(code, message),
        }
        Ok(self.snapshot())
    }

    /// Advance simulated time by `dt` and update phase and sensors.
    pub fn tick(&mut self, dt: Duration) -> TickReport {
        self.clock.advance(dt);
        let mut report = TickReport::default();
        let phase = self.state.phase;
        match phase {
            Phase::Idle | Phase::Complete => {
                if self.auto_start_due() {
                    report.auto_started = true;
                    report.phase_change = Some(PhaseChange {
                        from: phase,
                        to: Phase::Preparing,
                    });
                }
                return report;
            }
            // Halted until reset.
            Phase::Fault => return report,
            Phase::Preparing | Phase::Heating | Phase::Sterilizing | Phase::Cooling => {}
        }

        if let Some(duration) = self.state.parameters.phase_duration(phase) {
            if self.clock.now().saturating_sub(self.phase_entered_at) >= duration {
                report.phase_change = Some(self.finish_phase(phase));
            }
        }
        self.refresh_readings();
        report
    }

    fn require_idle(&self, command: &'static str) -> Result<(), DeviceError> {
        if self.state.phase != Phase::Idle {
            return Err(DeviceError::InvalidState {
                command,
                phase: self.state.phase,
            });
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        if !self.state.phase.accepts_start() {
            return Err(DeviceError::InvalidState {
                command: "start",
                phase: self.state.phase,
            });
        }
        let mut cycle_id = Uuid::new_v4().simple().to_string();
        cycle_id.truncate(8);
        tracing::info!("Starting new cycle ID: {}", cycle_id);

        self.state.reset();
        self.state.cycle_id = Some(cycle_id);
        self.state.started_at = Some(Utc::now());
        self.exact = SensorReadings::baseline();
        self.cycle_started_at = self.clock.now();
        self.next_auto_start = None;
        self.enter_phase(Phase::Preparing);
        Ok(())
    }

    fn abort(&mut self) {
        if self.state.phase == Phase::Idle {
            return;
        }
        tracing::info!(
            "Cycle {}: aborted during '{}' phase",
            self.cycle_label(),
            self.state.phase
        );
        self.state.reset();
        self.exact = SensorReadings::baseline();
        self.phase_origin = self.exact;
        self.schedule_auto_start();
    }

    fn inject_fault(&mut self, code: String, message: Option<String>) {
        let message = message.unwrap_or_else(|| INJECTED_FAULT_MESSAGE.to_string());
        tracing::warn!(
            "Cycle {}: fault {} ({}) injected during '{}' phase",
            self.cycle_label(),
            code,
            message,
            self.state.phase
        );
        self.halt(code, message);
    }

    fn halt(&mut self, code: String, message: String) {
        if self.state.phase.is_running() {
            self.state.elapsed_seconds = self.clock.seconds_since(self.cycle_started_at);
        }
        self.state.raise_fault(code, message);
        self.state.completed_at = Some(Utc::now());
        self.next_auto_start = None;
    }

    fn enter_phase(&mut self, phase: Phase) {
        self.state.phase = phase;
        self.state.phase_elapsed_seconds = 0.0;
        self.phase_entered_at = self.clock.now();
        self.phase_origin = self.exact;
        self.state.sensor_readings = self.exact;
    }

    /// Close out `phase` once its duration has elapsed: either an alarm or the next phase.
    fn finish_phase(&mut self, phase: Phase) -> PhaseChange {
        // Readings land exactly on the phase setpoint, whatever the tick granularity.
        if let Some(target) = SensorReadings::phase_target(phase, &self.state.parameters) {
            self.exact = target;
        }
        self.state.sensor_readings = self.exact;
        self.state.elapsed_seconds = self.clock.seconds_since(self.cycle_started_at);

        if self.roll_alarm() {
            let index = self.rng.random_range(0..ALARM_CODES.len());
            let (code, message) = ALARM_CODES[index];
            tracing::warn!(
                "Cycle {}: cancelled with alarm {} ({}) during '{}' phase",
                self.cycle_label(),
                code,
                message,
                phase
            );
            self.halt(code.to_string(), message.to_string());
            return PhaseChange {
                from: phase,
                to: Phase::Fault,
            };
        }

        let next = phase.next().unwrap_or(Phase::Complete);
        self.enter_phase(next);
        if next == Phase::Complete {
            self.state.completed_at = Some(Utc::now());
            self.state.cycles_completed += 1;
            tracing::info!("Cycle {}: completed successfully", self.cycle_label());
            self.schedule_auto_start();
        } else {
            tracing::info!(
                "Cycle {}: entering phase '{}' for {:.0}s",
                self.cycle_label(),
                next,
                self.state
                    .parameters
                    .phase_duration(next)
                    .unwrap_or_default()
                    .as_secs_f64()
            );
        }
        PhaseChange {
            from: phase,
            to: next,
        }
    }

    fn refresh_readings(&mut self) {
        let phase = self.state.phase;
        let params = &self.state.parameters;
        let (Some(target), Some(duration)) = (
            SensorReadings::phase_target(phase, params),
            params.phase_duration(phase),
        ) else {
            return;
        };
        let in_phase = self.clock.seconds_since(self.phase_entered_at);
        // Sub-nanosecond durations round to zero; such a phase is already at its target.
        let progress = if duration.is_zero() {
            1.0
        } else {
            in_phase / duration.as_secs_f64()
        };
        self.exact = SensorReadings::lerp(&self.phase_origin, &target, progress);
        self.state.sensor_readings = self.exact.with_noise(self.settings.sensor_noise, &mut self.rng);
        self.state.phase_elapsed_seconds = in_phase;
        self.state.elapsed_seconds = self.clock.seconds_since(self.cycle_started_at);
    }

    fn roll_alarm(&mut self) -> bool {
        let p = self.settings.fault_probability;
        p > 0.0 && self.rng.random_bool(p.min(1.0))
    }

    fn schedule_auto_start(&mut self) {
        let Some(auto) = self.settings.auto_cycle.clone() else {
            self.next_auto_start = None;
            return;
        };
        let min = auto.min_wait.as_secs_f64();
        let max = auto.max_wait.as_secs_f64();
        let wait = if max > min {
            self.rng.random_range(min..=max)
        } else {
            min
        };
        tracing::info!("Next cycle starting in {:.0} seconds", wait);
        self.next_auto_start = Some(self.clock.now() + Duration::from_secs_f64(wait));
    }

    fn auto_start_due(&mut self) -> bool {
        let now = self.clock.now();
        let due = matches!(self.next_auto_start, Some(at) if now >= at);
        due && self.start().is_ok()
    }

    fn cycle_label(&self) -> &str {
        self.state.cycle_id.as_deref().unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{HEATING_SECONDS, TARGET_TEMPERATURE_C};

    fn engine() -> CycleEngine {
        CycleEngine::new(
            Parameters::default(),
            EngineSettings {
                seed: Some(1),
                ..EngineSettings::default()
            },
        )
    }

    fn short_params() -> Parameters {
        Parameters {
            target_temperature_c: 50.0,
            preparing_seconds: 2.0,
            heating_seconds: 4.0,
            sterilizing_seconds: 3.0,
            cooling_seconds: 2.0,
        }
    }

    fn run_to(engine: &mut CycleEngine, phase: Phase) {
        for _ in 0..10_000 {
            if engine.state().phase == phase {
                return;
            }
            engine.tick(Duration::from_secs(1));
        }
        panic!("never reached {phase}");
    }

    #[test]
    fn test_start_enters_preparing() {
        let mut engine = engine();
        let state = engine.apply(Command::Start).unwrap();
        assert_eq!(state.phase, Phase::Preparing);
        let cycle_id = state.cycle_id.unwrap();
        assert_eq!(cycle_id.len(), 8);
        assert!(state.started_at.is_some());
    }

    #[test]
    fn test_second_start_is_rejected_without_change() {
        let mut engine = engine();
        let first = engine.apply(Command::Start).unwrap();
        let err = engine.apply(Command::Start).unwrap_err();
        assert_eq!(
            err,
            DeviceError::InvalidState {
                command: "start",
                phase: Phase::Preparing
            }
        );
        assert_eq!(err.kind(), "InvalidStateError");
        assert_eq!(engine.snapshot(), first);
    }

    #[test]
    fn test_full_cycle_walks_every_phase() {
        let mut engine = CycleEngine::new(short_params(), EngineSettings::default());
        engine.apply(Command::Start).unwrap();
        let mut seen = vec![engine.state().phase];
        for _ in 0..30 {
            let report = engine.tick(Duration::from_secs(1));
            if let Some(change) = report.phase_change {
                assert_eq!(change.from, *seen.last().unwrap());
                seen.push(change.to);
            }
        }
        assert_eq!(seen, Phase::CYCLE.to_vec());
        let state = engine.state();
        assert_eq!(state.cycles_completed, 1);
        assert!(state.completed_at.is_some());
        assert_eq!(state.elapsed_seconds, 11.0);
        assert_eq!(state.sensor_readings.temperature_c, 35.0);
        assert_eq!(state.sensor_readings.pressure_hpa, 1013.0);
    }

    #[test]
    fn test_one_phase_per_tick() {
        let mut engine = CycleEngine::new(short_params(), EngineSettings::default());
        engine.apply(Command::Start).unwrap();
        let report = engine.tick(Duration::from_secs(3600));
        assert_eq!(
            report.phase_change,
            Some(PhaseChange {
                from: Phase::Preparing,
                to: Phase::Heating
            })
        );
        assert_eq!(engine.state().phase, Phase::Heating);
        assert_eq!(engine.state().phase_elapsed_seconds, 0.0);
    }

    #[test]
    fn test_heating_ramp_is_monotonic() {
        let mut engine = engine();
        engine.apply(Command::Start).unwrap();
        run_to(&mut engine, Phase::Heating);
        let target = engine.state().parameters.target_temperature_c;
        let mut last = engine.state().sensor_readings.temperature_c;
        while engine.state().phase == Phase::Heating {
            engine.tick(Duration::from_millis(700));
            let temp = engine.state().sensor_readings.temperature_c;
            if engine.state().phase != Phase::Heating {
                break;
            }
            assert!(temp >= last, "temperature dropped from {last} to {temp}");
            assert!(temp <= target);
            last = temp;
        }
        assert_eq!(engine.state().phase, Phase::Sterilizing);
        assert_eq!(engine.state().sensor_readings.temperature_c, target);
    }

    #[test]
    fn test_set_parameter_only_while_idle() {
        let mut engine = engine();
        engine
            .apply(Command::set_parameter(TARGET_TEMPERATURE_C, 55.0))
            .unwrap();
        engine.apply(Command::Start).unwrap();
        let before = engine.state().parameters.clone();
        let err = engine
            .apply(Command::set_parameter(HEATING_SECONDS, 10.0))
            .unwrap_err();
        assert!(matches!(err, DeviceError::InvalidState { .. }));
        assert_eq!(engine.state().parameters, before);
        assert_eq!(before.target_temperature_c, 55.0);
    }

    #[test]
    fn test_set_parameters_rejected_in_complete_and_fault() {
        let mut engine = CycleEngine::new(short_params(), EngineSettings::default());
        engine.apply(Command::Start).unwrap();
        run_to(&mut engine, Phase::Complete);
        assert!(engine
            .apply(Command::set_parameter(HEATING_SECONDS, 10.0))
            .is_err());
        engine.apply(Command::inject_fault("E01")).unwrap();
        assert!(engine
            .apply(Command::set_parameter(HEATING_SECONDS, 10.0))
            .is_err());
    }

    #[test]
    fn test_abort_is_idempotent() {
        let mut engine = engine();
        engine.apply(Command::Start).unwrap();
        engine.tick(Duration::from_secs(5));
        for _ in 0..3 {
            let state = engine.apply(Command::Abort).unwrap();
            assert_eq!(state.phase, Phase::Idle);
            assert!(state.cycle_id.is_none());
            assert_eq!(state.sensor_readings, SensorReadings::baseline());
        }
    }

    #[test]
    fn test_fault_halts_engine() {
        let mut engine = engine();
        engine.apply(Command::Start).unwrap();
        engine.tick(Duration::from_secs(10));
        let faulted = engine.apply(Command::inject_fault("E01")).unwrap();
        assert_eq!(faulted.phase, Phase::Fault);
        assert!(faulted.fault_active);
        assert_eq!(faulted.fault_code.as_deref(), Some("E01"));
        assert_eq!(faulted.fault_message.as_deref(), Some(INJECTED_FAULT_MESSAGE));
        for _ in 0..100 {
            let report = engine.tick(Duration::from_secs(60));
            assert!(report.phase_change.is_none());
        }
        assert_eq!(engine.state().phase, Phase::Fault);
        assert_eq!(
            engine.state().sensor_readings,
            faulted.sensor_readings
        );
    }

    #[test]
    fn test_inject_fault_from_idle_and_restart() {
        let mut engine = engine();
        let state = engine
            .apply(Command::InjectFault {
                code: "E07".to_string(),
                message: Some("Door open".to_string()),
            })
            .unwrap();
        assert_eq!(state.phase, Phase::Fault);
        assert_eq!(state.fault_message.as_deref(), Some("Door open"));
        let restarted = engine.apply(Command::Start).unwrap();
        assert_eq!(restarted.phase, Phase::Preparing);
        assert!(!restarted.fault_active);
        assert!(restarted.fault_code.is_none());
    }

    #[test]
    fn test_abort_after_complete_resets() {
        let mut engine = CycleEngine::new(short_params(), EngineSettings::default());
        engine.apply(Command::Start).unwrap();
        run_to(&mut engine, Phase::Complete);
        assert!(engine.state().cycle_id.is_some());
        let state = engine.apply(Command::Abort).unwrap();
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.cycle_id.is_none());
        assert_eq!(state.sensor_readings, SensorReadings::baseline());
        assert_eq!(state.cycles_completed, 1);
    }

    #[test]
    fn test_certain_alarm_faults_first_phase() {
        let mut engine = CycleEngine::new(
            short_params(),
            EngineSettings {
                fault_probability: 1.0,
                seed: Some(3),
                ..EngineSettings::default()
            },
        );
        engine.apply(Command::Start).unwrap();
        run_to(&mut engine, Phase::Fault);
        let state = engine.state();
        let code = state.fault_code.as_deref().unwrap();
        assert!(ALARM_CODES.iter().any(|(c, _)| *c == code));
        assert_eq!(state.elapsed_seconds, 2.0);
    }

    #[test]
    fn test_auto_cycle_starts_after_wait() {
        let mut engine = CycleEngine::new(
            short_params(),
            EngineSettings {
                seed: Some(9),
                auto_cycle: Some(AutoCycle {
                    min_wait: Duration::from_secs(5),
                    max_wait: Duration::from_secs(5),
                }),
                ..EngineSettings::default()
            },
        );
        assert_eq!(engine.next_auto_start(), Some(Duration::from_secs(5)));
        for _ in 0..4 {
            assert!(!engine.tick(Duration::from_secs(1)).auto_started);
        }
        let report = engine.tick(Duration::from_secs(1));
        assert!(report.auto_started);
        assert_eq!(engine.state().phase, Phase::Preparing);
        assert!(engine.next_auto_start().is_none());

        run_to(&mut engine, Phase::Complete);
        assert!(engine.next_auto_start().is_some());
        run_to(&mut engine, Phase::Preparing);
        assert_eq!(engine.state().cycles_completed, 1);
    }

    #[test]
    fn test_auto_cycle_never_leaves_fault() {
        let mut engine = CycleEngine::new(
            short_params(),
            EngineSettings {
                auto_cycle: Some(AutoCycle {
                    min_wait: Duration::from_secs(1),
                    max_wait: Duration::from_secs(1),
                }),
                ..EngineSettings::default()
            },
        );
        engine.apply(Command::inject_fault("E01")).unwrap();
        for _ in 0..10 {
            engine.tick(Duration::from_secs(1));
        }
        assert_eq!(engine.state().phase, Phase::Fault);
    }

    #[test]
    fn test_vanishing_phase_duration_keeps_readings_finite() {
        let mut engine = engine();
        engine
            .apply(Command::set_parameter(HEATING_SECONDS, 1e-10))
            .unwrap();
        engine.apply(Command::Start).unwrap();
        engine.tick(Duration::from_secs(30));
        let state = engine.state();
        assert_eq!(state.phase, Phase::Heating);
        let readings = state.sensor_readings;
        assert!(readings.temperature_c.is_finite());
        assert!(readings.pressure_hpa.is_finite());
        assert!(readings.h2o2_ppm.is_finite());
        assert_eq!(readings.temperature_c, state.parameters.target_temperature_c);

        engine.tick(Duration::from_millis(1));
        assert_eq!(engine.state().phase, Phase::Sterilizing);
        assert!(engine.state().sensor_readings.pressure_hpa.is_finite());
    }
}
