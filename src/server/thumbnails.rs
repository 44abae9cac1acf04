//! Thumbnail upload, removal and serving.

use axum::{
    extract::{multipart::MultipartError, FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use image::ImageFormat;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{blocking, ApiError, AppState, MAX_UPLOAD_BYTES};
use crate::image_ops::{self, THUMBNAIL_EXTENSION};

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "thumbnail";

#[derive(Debug, Deserialize)]
struct UrlUpload {
    #[serde(default)]
    url: String,
}

fn too_large() -> ApiError {
    ApiError::bad_request("File too large (max 10MB)")
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large()
    } else {
        ApiError::bad_request(err.body_text())
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        image_ops::validate_upload_name(&file_name)?;

        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(too_large());
        }
        debug!(%file_name, bytes = bytes.len(), "Received upload");
        return Ok(bytes.to_vec());
    }
    Err(ApiError::bad_request("No file provided"))
}

/// POST /api/devices/{id}/thumbnail
///
/// Accepts either a JSON `{"url": ...}` body or a multipart upload. Both are
/// normalized to a JPEG before being stored.
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    state.registry.get(&id)?;

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let raw = if content_type.starts_with("application/json") {
        let Json(body) = Json::<UrlUpload>::from_request(request, &state)
            .await
            .map_err(|_| ApiError::bad_request("Invalid JSON"))?;
        let url = body.url.trim();
        if url.is_empty() {
            return Err(ApiError::bad_request("URL is required"));
        }
        state.fetcher.fetch(url).await?
    } else if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        read_upload(multipart).await?
    } else {
        return Err(ApiError::bad_request("Invalid content type"));
    };

    let registry = state.registry.clone();
    let device_id = id.clone();
    blocking(move || {
        let processed = image_ops::process_thumbnail(&raw)?;
        registry.set_thumbnail(&device_id, &processed, THUMBNAIL_EXTENSION)
    })
    .await?;

    info!(%id, "Thumbnail updated");
    Ok(Json(json!({ "status": "ok" })))
}

/// DELETE /api/devices/{id}/thumbnail
pub async fn delete_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let registry = state.registry.clone();
    blocking(move || registry.delete_thumbnail(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /thumbnails/{file}
///
/// `{file}` is a device id, optionally followed by any extension.
pub async fn serve_thumbnail(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let id = file.rsplit_once('.').map_or(file.as_str(), |(stem, _)| stem);
    let not_found = || ApiError::new(StatusCode::NOT_FOUND, "Thumbnail not found");

    let path = state.registry.thumbnail_path(id).ok_or_else(not_found)?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(ApiError::internal(format!("reading thumbnail: {e}"))),
    };

    let mime = ImageFormat::from_path(&path).map_or("application/octet-stream", |f| f.to_mime_type());
    Ok((
        [(header::CONTENT_TYPE, mime), (header::CACHE_CONTROL, "no-cache")],
        bytes,
    )
        .into_response())
}
