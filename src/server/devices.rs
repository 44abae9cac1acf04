//! Device CRUD, status and redirect handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::debug;

use super::{blocking, ApiError, AppState};
use crate::probe::{self, DeviceStatus};
use crate::registry::{redirect_url, DeviceInput, DeviceView};

fn json_body(payload: Result<Json<DeviceInput>, JsonRejection>) -> Result<DeviceInput, ApiError> {
    payload
        .map(|Json(input)| input)
        .map_err(|e| {
            debug!(error = %e, "Rejected device payload");
            ApiError::bad_request("Invalid JSON")
        })
}

/// GET /api/devices
pub async fn list_devices(State(state): State<AppState>) -> Json<Vec<DeviceView>> {
    Json(state.registry.list().iter().map(DeviceView::from).collect())
}

/// POST /api/devices
pub async fn create_device(
    State(state): State<AppState>,
    payload: Result<Json<DeviceInput>, JsonRejection>,
) -> Result<(StatusCode, Json<DeviceView>), ApiError> {
    let input = json_body(payload)?;
    let registry = state.registry.clone();
    let device = blocking(move || registry.add(input)).await?;
    Ok((StatusCode::CREATED, Json(device.into())))
}

/// GET /api/devices/{id}
pub async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeviceView>, ApiError> {
    let device = state.registry.get(&id)?;
    Ok(Json(device.into()))
}

/// PUT /api/devices/{id}
pub async fn update_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<DeviceInput>, JsonRejection>,
) -> Result<Json<DeviceView>, ApiError> {
    let input = json_body(payload)?;
    let registry = state.registry.clone();
    let device = blocking(move || registry.update(&id, input)).await?;
    Ok(Json(device.into()))
}

/// DELETE /api/devices/{id}
pub async fn delete_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let registry = state.registry.clone();
    blocking(move || registry.delete(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/status
pub async fn device_status(State(state): State<AppState>) -> Json<Vec<DeviceStatus>> {
    let devices = state.registry.list();
    Json(probe::probe_devices(&devices, state.probe_timeout).await)
}

/// GET /go/{id}
pub async fn go_to_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let device = state.registry.get(&id)?;
    Ok((StatusCode::FOUND, [(header::LOCATION, redirect_url(&device))]))
}
