// src/server.rs - binds both listeners and runs them alongside the cycle ticker
use crate::config::Config;
use crate::ticker::CycleTicker;
use crate::web::{api, models::DeviceInfo, telemetry};
use matachana_device::{CycleEngine, Device};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[from] io::Error),
}

/// One simulated sterilizer with its two HTTP surfaces.
pub struct Simulator {
    config: Config,
    device: Device,
}

impl Simulator {
    pub fn new(config: Config) -> Self {
        let engine = CycleEngine::new(
            config.cycle.parameters(),
            config.simulation.engine_settings(),
        );
        Self {
            config,
            device: Device::new(engine),
        }
    }

    /// Bind both listeners. Nothing is served until [`BoundSimulator::serve`].
    pub async fn bind(self) -> Result<BoundSimulator, ServerError> {
        let api_listener = bind_listener(self.config.server.api_addr()).await?;
        let telemetry_listener = bind_listener(self.config.server.telemetry_addr()).await?;
        Ok(BoundSimulator {
            config: self.config,
            device: self.device,
            api_listener,
            telemetry_listener,
        })
    }
}

async fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr).await.map_err(|source| {
        tracing::error!("Failed to bind {}: {}", addr, source);
        ServerError::Bind { addr, source }
    })
}

pub struct BoundSimulator {
    config: Config,
    device: Device,
    api_listener: TcpListener,
    telemetry_listener: TcpListener,
}

impl BoundSimulator {
    pub fn api_addr(&self) -> io::Result<SocketAddr> {
        self.api_listener.local_addr()
    }

    pub fn telemetry_addr(&self) -> io::Result<SocketAddr> {
        self.telemetry_listener.local_addr()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Serve both ports until `shutdown` resolves, then drain them and stop the ticker.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let info = DeviceInfo::from(&self.config.device);
        let tick_interval = self.config.simulation.tick_interval();
        let api_app = api::create_router(self.device.clone(), info.clone());
        let telemetry_app = telemetry::create_router(self.device.clone(), info, tick_interval);

        tracing::info!("Control API listening on http://{}", self.api_addr()?);
        tracing::info!("Telemetry listening on http://{}", self.telemetry_addr()?);

        let ticker = CycleTicker::new(
            self.device.clone(),
            tick_interval,
            self.config.simulation.speed_factor,
        )
        .spawn();

        // Fan the single shutdown signal out to both servers.
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut api_rx = shutdown_tx.subscribe();
        let mut telemetry_rx = shutdown_tx.subscribe();
        let signal = tokio::spawn(async move {
            shutdown.await;
            tracing::info!("Shutdown requested, draining connections");
            let _ = shutdown_tx.send(());
        });

        let api_server = axum::serve(self.api_listener, api_app).with_graceful_shutdown(async move {
            let _ = api_rx.recv().await;
        });
        let telemetry_server = axum::serve(self.telemetry_listener, telemetry_app)
            .with_graceful_shutdown(async move {
                let _ = telemetry_rx.recv().await;
            });

        let result = tokio::try_join!(
            async { api_server.await },
            async { telemetry_server.await }
        );
        signal.abort();
        ticker.stop().await;
        result?;
        tracing::info!("Simulator stopped");
        Ok(())
    }
}
