//! Robot mode JSON output implementation.

use std::path::Path;

use serde::Serialize;
use serde_json::json;
use tracing::{error, trace};

use crate::error::KvmmError;
use crate::probe::DeviceStatus;
use crate::registry::DeviceView;

use super::{DeviceAction, DeviceListing, Output, RobotFormat, VersionInfo};

/// Serialize `data` in the requested format.
pub fn to_json<T: Serialize + ?Sized>(data: &T, format: RobotFormat) -> serde_json::Result<String> {
    match format {
        RobotFormat::Json => serde_json::to_string_pretty(data),
        RobotFormat::JsonCompact => serde_json::to_string(data),
    }
}

/// JSON output implementation for scripting.
pub struct RobotOutput {
    format: RobotFormat,
}

impl RobotOutput {
    pub const fn new(format: RobotFormat) -> Self {
        Self { format }
    }

    /// Output any serializable data as JSON to stdout.
    fn output_json<T: Serialize + ?Sized>(&self, data: &T) {
        match to_json(data, self.format) {
            Ok(json) => {
                trace!(json_len = json.len(), "JSON serialized");
                println!("{json}");
            }
            Err(e) => error!(error = %e, "Failed to serialize output"),
        }
    }
}

impl Output for RobotOutput {
    fn success(&self, message: &str) {
        self.output_json(&json!({ "ok": true, "message": message }));
    }

    fn error(&self, error: &KvmmError) {
        let body = json!({
            "error": true,
            "message": error.to_string(),
            "suggestion": error.suggestion(),
            "recoverable": error.is_user_recoverable(),
        });
        match to_json(&body, RobotFormat::Json) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("{error}"),
        }
    }

    fn device_list(&self, devices: &[DeviceListing]) {
        self.output_json(devices);
    }

    fn device_detail(&self, device: &DeviceListing, url: &str) {
        self.output_json(&json!({ "device": device, "url": url }));
    }

    fn device_changed(&self, action: DeviceAction, device: &DeviceView) {
        self.output_json(&json!({ "ok": true, "action": action, "device": device }));
    }

    fn device_removed(&self, id: &str) {
        self.output_json(&json!({ "ok": true, "action": DeviceAction::Removed, "id": id }));
    }

    fn device_url(&self, device: &DeviceView, url: &str, opened: bool) {
        self.output_json(&json!({ "id": device.id, "url": url, "opened": opened }));
    }

    fn status_report(&self, devices: &[DeviceListing]) {
        let statuses: Vec<DeviceStatus> = devices
            .iter()
            .map(|row| DeviceStatus {
                id: row.device.id.clone(),
                reachable: row.reachable.unwrap_or(false),
            })
            .collect();
        self.output_json(&statuses);
    }

    fn thumbnail_set(&self, id: &str, path: &Path) {
        self.output_json(&json!({ "ok": true, "id": id, "path": path.display().to_string() }));
    }

    fn thumbnail_cleared(&self, id: &str) {
        self.output_json(&json!({ "ok": true, "id": id, "thumbnail": null }));
    }

    fn thumbnail_path(&self, id: &str, path: Option<&Path>) {
        self.output_json(&json!({
            "id": id,
            "path": path.map(|p| p.display().to_string()),
        }));
    }

    fn version_info(&self, info: &VersionInfo) {
        self.output_json(info);
    }
}
