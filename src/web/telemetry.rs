//! Telemetry surface served on the secondary port.
//!
//! * `GET /metrics` - Prometheus text exposition (format 0.0.4)
//! * `GET /telemetry` - one JSON [`TelemetryFrame`]
//! * `GET /telemetry/stream` - server-sent events, one `telemetry` event per interval

use crate::web::models::{DeviceInfo, TelemetryFrame};
use async_stream::stream;
use axum::{
    Json, Router,
    extract::State,
    http::header,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use futures_core::stream::Stream;
use matachana_device::{Device, DeviceState};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub struct TelemetryStateInner {
    pub device: Device,
    pub info: DeviceInfo,
    pub stream_interval: Duration,
}
pub type TelemetryState = Arc<TelemetryStateInner>;

pub fn create_router(device: Device, info: DeviceInfo, stream_interval: Duration) -> Router {
    let state = Arc::new(TelemetryStateInner {
        device,
        info,
        stream_interval,
    });
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/telemetry", get(get_telemetry))
        .route("/telemetry/stream", get(stream_telemetry))
        .with_state(state)
}

async fn get_metrics(State(state): State<TelemetryState>) -> Response {
    let snapshot = state.device.read().await;
    let body = render_metrics(&snapshot, &state.info);
    ([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], body).into_response()
}

async fn get_telemetry(State(state): State<TelemetryState>) -> Json<TelemetryFrame> {
    Json(TelemetryFrame::from(&state.device.read().await))
}

async fn stream_telemetry(
    State(state): State<TelemetryState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("Telemetry stream client connected");
    Sse::new(telemetry_events(state)).keep_alive(KeepAlive::default())
}

/// Emits a frame immediately, then one per `stream_interval`.
fn telemetry_events(state: TelemetryState) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    stream! {
        let mut interval = tokio::time::interval(state.stream_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let frame = TelemetryFrame::from(&state.device.read().await);
            match Event::default().event("telemetry").json_data(&frame) {
                Ok(event) => yield Ok(event),
                Err(e) => {
                    tracing::error!("Failed to encode telemetry frame: {}", e);
                    break;
                }
            }
        }
    }
}

/// Render the device snapshot as Prometheus text.
pub fn render_metrics(state: &DeviceState, info: &DeviceInfo) -> String {
    let mut out = String::new();
    let readings = &state.sensor_readings;

    gauge(
        &mut out,
        "hpo_cycle_phase",
        "Current cycle phase (0=Idle 1=Preparing 2=Heating 3=Sterilizing 4=Cooling 5=Complete 6=Fault)",
        f64::from(state.phase.ordinal()),
    );
    gauge(
        &mut out,
        "hpo_chamber_pressure_hpa",
        "Chamber pressure in hectopascal",
        readings.pressure_hpa,
    );
    gauge(
        &mut out,
        "hpo_chamber_temperature_c",
        "Chamber temperature in degrees Celsius",
        readings.temperature_c,
    );
    gauge(
        &mut out,
        "hpo_h2o2_concentration_ppm",
        "Hydrogen peroxide concentration in parts per million",
        readings.h2o2_ppm,
    );
    gauge(
        &mut out,
        "hpo_cycles_completed",
        "Cycles completed since start",
        state.cycles_completed as f64,
    );
    gauge(
        &mut out,
        "hpo_cycle_elapsed_seconds",
        "Simulated seconds since the current cycle started",
        state.elapsed_seconds,
    );
    gauge(
        &mut out,
        "hpo_fault_active",
        "1 when the device is in fault",
        if state.fault_active { 1.0 } else { 0.0 },
    );

    if let Some(code) = &state.fault_code {
        header_lines(&mut out, "hpo_fault_info", "Active fault code");
        out.push_str(&format!(
            "hpo_fault_info{{code=\"{}\"}} 1\n",
            escape_label(code)
        ));
    }

    header_lines(&mut out, "hpo_device_info", "Device identity");
    out.push_str(&format!(
        "hpo_device_info{{model=\"{}\",serial=\"{}\"}} 1\n",
        escape_label(&info.model),
        escape_label(&info.serial_number)
    ));
    out
}

fn header_lines(out: &mut String, name: &str, help: &str) {
    out.push_str(&format!("# HELP {name} {help}\n# TYPE {name} gauge\n"));
}

fn gauge(out: &mut String, name: &str, help: &str, value: f64) {
    header_lines(out, name, help);
    out.push_str(&format!("{name} {value}\n"));
}

/// Label values escape backslash, double quote and newline.
fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
