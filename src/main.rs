// src/main.rs - Matachana 130HPO simulator entry point
use clap::Parser;
use matachana_sim::cli::Cli;
use matachana_sim::server::Simulator;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    // Reported once, by the `Err` returned from `main`.
    let config = cli.resolve_config()?;

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Matachana 130HPO simulator");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Device: {} ({})",
        config.device.model,
        config.device.serial_number
    );
    tracing::info!(
        "Cycle: {}s preparing, {}s heating, {}s sterilizing, {}s cooling at {} °C",
        config.cycle.preparing_seconds,
        config.cycle.heating_seconds,
        config.cycle.sterilizing_seconds,
        config.cycle.cooling_seconds,
        config.cycle.target_temperature_c
    );
    tracing::info!(
        "Tick every {} ms at speed factor {}",
        config.simulation.tick_interval_ms,
        config.simulation.speed_factor
    );
    if config.simulation.auto_cycle {
        tracing::info!(
            "Auto cycle enabled: {}-{} s between cycles",
            config.simulation.min_wait_seconds,
            config.simulation.max_wait_seconds
        );
    }

    let simulator = Simulator::new(config).bind().await?;
    simulator.serve(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
