//! Control API served on the primary port.
//!
//! | Route | Body | Success | Errors |
//! |-------|------|---------|--------|
//! | `GET /status` | - | `200` device state | - |
//! | `POST /start` | - | `200` `{"result":"ok","status":{..}}` | `409` cycle already running |
//! | `POST /abort` | - | `200`, also when already idle | - |
//! | `GET /parameters` | - | `200` parameter map | - |
//! | `POST /parameters` | `{"heatingSeconds": 90, ..}` | `200` | `409` not idle, `400` unknown name or bad value |
//! | `POST /fault` | `{"code": "E01", "message": ".."}` | `200`, device enters `Fault` | - |
//! | `GET /info` | - | `200` device identity | - |
//!
//! Errors carry `{"error": "..", "kind": "..", "status": {..}}` where `kind`
//! is one of `InvalidStateError`, `UnknownParameterError`,
//! `InvalidParameterValueError` or `TransportError` (malformed request;
//! no `status` in that case).

use crate::web::models::{CommandResponse, DeviceInfo, ErrorResponse, FaultRequest};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use matachana_device::{Command, Device, DeviceError, DeviceState};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct AppStateInner {
    pub device: Device,
    pub info: DeviceInfo,
}
pub type AppState = Arc<AppStateInner>;

/// Creates the Axum router with all the control endpoints.
pub fn create_router(device: Device, info: DeviceInfo) -> Router {
    create_router_with_state(Arc::new(AppStateInner { device, info }))
}

fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/start", post(start_cycle))
        .route("/abort", post(abort_cycle))
        .route("/parameters", get(get_parameters).post(set_parameters))
        .route("/fault", post(inject_fault))
        .route("/info", get(get_info))
        .with_state(state)
}

/// Helper to create a JSON error response with a message, kind and status code
fn json_error(
    message: String,
    kind: &'static str,
    code: StatusCode,
    status: Option<DeviceState>,
) -> Response {
    (
        code,
        Json(ErrorResponse {
            error: message,
            kind,
            status,
        }),
    )
        .into_response()
}

fn device_error_code(error: &DeviceError) -> StatusCode {
    match error {
        DeviceError::InvalidState { .. } => StatusCode::CONFLICT,
        DeviceError::UnknownParameter(_) | DeviceError::InvalidParameterValue { .. } => {
            StatusCode::BAD_REQUEST
        }
    }
}

fn transport_error(rejection: JsonRejection) -> Response {
    tracing::warn!("Rejected malformed request: {}", rejection.body_text());
    json_error(rejection.body_text(), "TransportError", rejection.status(), None)
}

/// Run a command through the device and map the outcome to a response.
async fn run_command(state: &AppState, command: Command) -> Response {
    let name = command.name();
    match state.device.apply(command).await {
        Ok(status) => (StatusCode::OK, Json(CommandResponse::ok(status))).into_response(),
        Err(e) => {
            tracing::info!("Rejected {} command: {}", name, e);
            let status = state.device.read().await;
            json_error(e.to_string(), e.kind(), device_error_code(&e), Some(status))
        }
    }
}

/// GET /status
async fn get_status(State(state): State<AppState>) -> Json<DeviceState> {
    Json(state.device.read().await)
}

/// POST /start
async fn start_cycle(State(state): State<AppState>) -> Response {
    run_command(&state, Command::Start).await
}

/// POST /abort
async fn abort_cycle(State(state): State<AppState>) -> Response {
    run_command(&state, Command::Abort).await
}

/// GET /parameters
async fn get_parameters(State(state): State<AppState>) -> Json<BTreeMap<String, f64>> {
    Json(state.device.read().await.parameters.to_map())
}

/// POST /parameters
async fn set_parameters(
    State(state): State<AppState>,
    payload: Result<Json<BTreeMap<String, f64>>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(updates)) => run_command(&state, Command::SetParameters(updates)).await,
        Err(rejection) => transport_error(rejection),
    }
}

/// POST /fault
async fn inject_fault(
    State(state): State<AppState>,
    payload: Result<Json<FaultRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => {
            let command = Command::InjectFault {
                code: request.code,
                message: request.message,
            };
            run_command(&state, command).await
        }
        Err(rejection) => transport_error(rejection),
    }
}

/// GET /info
async fn get_info(State(state): State<AppState>) -> Json<DeviceInfo> {
    Json(state.info.clone())
}
