//! Offline cycle harness: drives the cycle engine on a virtual clock, no sockets involved.

use clap::{Parser, Subcommand};
use matachana_device::{Command, CycleEngine, DeviceState, Parameters, Phase, SensorReadings};
use matachana_sim::config::{Config, ConfigError, load_config};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

/// Cycle Harness CLI
#[derive(Parser, Debug)]
#[command(name = "cycle_harness", about = "Run sterilization cycles offline and print one JSON line per step.")]
pub struct Cli {
    /// Path to a TOML config file (overrides defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cycle parameter override (e.g. --param heatingSeconds=60)
    #[arg(long, value_parser = parse_key_val, number_of_values = 1)]
    param: Vec<(String, f64)>,

    /// Seed for alarms and sensor noise
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one cycle (default)
    Run {
        /// Simulated milliseconds per step
        #[arg(long, default_value_t = 1000)]
        step_ms: u64,
        /// Inject a fault once the cycle has run this many simulated seconds
        #[arg(long)]
        fault_at: Option<f64>,
        /// Code used for the injected fault
        #[arg(long, default_value = "E01")]
        fault_code: String,
        /// Stop after this many simulated seconds even if the cycle is still running
        #[arg(long, default_value_t = 86_400.0)]
        max_seconds: f64,
    },
    /// Print the phase plan for the loaded configuration
    Phases,
}

fn parse_key_val(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid KEY=VAL: no `=` found in '{}'.", s))?;
    let value = value
        .parse::<f64>()
        .map_err(|e| format!("Invalid value for '{}': {}", key, e))?;
    Ok((key.to_string(), value))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StepLine<'a> {
    step: u64,
    sim_seconds: f64,
    phase: Phase,
    elapsed_seconds: f64,
    sensor_readings: &'a SensorReadings,
    fault_code: Option<&'a str>,
}

impl<'a> StepLine<'a> {
    fn new(step: u64, sim_seconds: f64, state: &'a DeviceState) -> Self {
        Self {
            step,
            sim_seconds,
            phase: state.phase,
            elapsed_seconds: state.elapsed_seconds,
            sensor_readings: &state.sensor_readings,
            fault_code: state.fault_code.as_deref(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PhasePlan {
    phase: Phase,
    starts_at_seconds: f64,
    duration_seconds: f64,
    target: SensorReadings,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => eprintln!("Failed to encode output line: {e}"),
    }
}

fn print_phases(params: &Parameters) {
    let mut starts_at = 0.0;
    for phase in Phase::CYCLE {
        let (Some(duration), Some(target)) = (
            params.phase_duration(phase),
            SensorReadings::phase_target(phase, params),
        ) else {
            continue;
        };
        print_json(&PhasePlan {
            phase,
            starts_at_seconds: starts_at,
            duration_seconds: duration.as_secs_f64(),
            target,
        });
        starts_at += duration.as_secs_f64();
    }
}

/// Returns the final phase reached.
fn run_cycle(
    engine: &mut CycleEngine,
    step: Duration,
    fault_at: Option<f64>,
    fault_code: &str,
    max_seconds: f64,
) -> Phase {
    if let Err(e) = engine.apply(Command::Start) {
        eprintln!("Failed to start cycle: {e}");
        return engine.state().phase;
    }
    let mut steps = 0;
    print_json(&StepLine::new(steps, 0.0, engine.state()));
    let mut fault_pending = fault_at;
    loop {
        engine.tick(step);
        steps += 1;
        if let Some(at) = fault_pending {
            if engine.state().elapsed_seconds >= at && engine.state().phase.is_running() {
                let _ = engine.apply(Command::inject_fault(fault_code));
                fault_pending = None;
            }
        }
        let sim_seconds = engine.clock().now().as_secs_f64();
        let state = engine.state();
        print_json(&StepLine::new(steps, sim_seconds, state));
        if !state.phase.is_running() || sim_seconds >= max_seconds {
            return state.phase;
        }
    }
}

/// Defaults or the given file, checked the same way the simulator checks its config.
fn load_harness_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_harness_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut params = config.cycle.parameters();
    for (key, value) in &cli.param {
        if let Err(e) = params.set(key, *value) {
            eprintln!("Invalid --param {key}={value}: {e}");
            return ExitCode::FAILURE;
        }
    }

    match cli.command {
        Some(Commands::Phases) => {
            print_phases(&params);
            ExitCode::SUCCESS
        }
        Some(Commands::Run {
            step_ms,
            fault_at,
            fault_code,
            max_seconds,
        }) => run(&config, params, cli.seed, step_ms, fault_at, &fault_code, max_seconds),
        None => run(&config, params, cli.seed, 1000, None, "E01", 86_400.0),
    }
}

fn run(
    config: &Config,
    params: Parameters,
    seed: Option<u64>,
    step_ms: u64,
    fault_at: Option<f64>,
    fault_code: &str,
    max_seconds: f64,
) -> ExitCode {
    if step_ms == 0 {
        eprintln!("--step-ms must be greater than zero");
        return ExitCode::FAILURE;
    }
    let mut settings = config.simulation.engine_settings();
    // Auto cycle would restart forever; one cycle only here.
    settings.auto_cycle = None;
    if seed.is_some() {
        settings.seed = seed;
    }
    let mut engine = CycleEngine::new(params, settings);
    let step = Duration::from_millis(step_ms);
    match run_cycle(&mut engine, step, fault_at, fault_code, max_seconds) {
        Phase::Complete => ExitCode::SUCCESS,
        Phase::Fault => ExitCode::from(2),
        phase => {
            eprintln!("Stopped in phase {phase} after {max_seconds} simulated seconds");
            ExitCode::from(3)
        }
    }
}
