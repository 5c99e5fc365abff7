// src/ticker.rs - background task that drives the simulated clock
use matachana_device::Device;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Upper bound on one tick's simulated step. It is at least the longest phase,
/// so an oversized step still finishes the current phase instead of stalling the clock.
pub const MAX_TICK_STEP: Duration = Duration::from_secs(86_400);

/// Wall time `elapsed` scaled by `speed_factor`, capped at [`MAX_TICK_STEP`].
pub fn scaled_step(elapsed: Duration, speed_factor: f64) -> Duration {
    Duration::try_from_secs_f64(elapsed.as_secs_f64() * speed_factor)
        .map_or(MAX_TICK_STEP, |dt| dt.min(MAX_TICK_STEP))
}

/// Advances the device once per `interval`, scaling real elapsed time by `speed_factor`.
#[derive(Clone)]
pub struct CycleTicker {
    device: Device,
    interval: Duration,
    speed_factor: f64,
}

impl CycleTicker {
    pub fn new(device: Device, interval: Duration, speed_factor: f64) -> Self {
        Self {
            device,
            interval,
            speed_factor,
        }
    }

    /// Spawn the tick loop. It runs until [`TickerHandle::stop`] is called.
    pub fn spawn(self) -> TickerHandle {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last = Instant::now();
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Cycle ticker shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let now = Instant::now();
                        let dt = scaled_step(now.duration_since(last), self.speed_factor);
                        last = now;
                        let report = self.device.tick(dt).await;
                        if let Some(change) = report.phase_change {
                            tracing::debug!("Phase {} -> {}", change.from, change.to);
                        }
                    }
                }
            }
        });
        TickerHandle { shutdown_tx, task }
    }
}

pub struct TickerHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl TickerHandle {
    /// Signal the loop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            tracing::error!("Cycle ticker task failed: {}", e);
        }
    }
}
