//! # HTTP API
//!
//! JSON device API, thumbnail upload and serving, reachability status and
//! the `/go/{id}` redirect, all backed by one shared [`Registry`].
//!
//! ## Usage
//!
//! ```bash
//! kvmm serve --port 8080 --bind 0.0.0.0
//! ```

mod devices;
mod error;
mod thumbnails;

pub use error::ApiError;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::error::{KvmmError, Result};
use crate::fetch::ImageFetcher;
use crate::probe::DEFAULT_PROBE_TIMEOUT;
use crate::registry::Registry;

/// Largest accepted thumbnail upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Shared state available to all route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub fetcher: ImageFetcher,
    pub probe_timeout: Duration,
}

impl AppState {
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        Ok(Self {
            registry,
            fetcher: ImageFetcher::new()?,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        })
    }
}

/// Build the complete axum router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/devices",
            get(devices::list_devices).post(devices::create_device),
        )
        .route(
            "/api/devices/{id}",
            get(devices::get_device)
                .put(devices::update_device)
                .delete(devices::delete_device),
        )
        .route(
            "/api/devices/{id}/thumbnail",
            post(thumbnails::upload_thumbnail).delete(thumbnails::delete_thumbnail),
        )
        .route("/thumbnails/{file}", get(thumbnails::serve_thumbnail))
        .route("/api/status", get(devices::device_status))
        .route("/go/{id}", get(devices::go_to_device))
        // Multipart framing needs a little room above the file limit
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run blocking registry work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(format!("worker task failed: {e}")))?
        .map_err(ApiError::from)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(registry: Arc<Registry>, addr: SocketAddr) -> Result<()> {
    let app = build_router(AppState::new(registry.clone())?);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| KvmmError::WebServerFailed {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

    info!(
        %addr,
        config = %registry.config_path().display(),
        devices = registry.len(),
        "kvmm server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| KvmmError::WebServerFailed {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
