//! Output mode abstraction for robot and human output.

use std::path::Path;

use serde::Serialize;

use crate::cli::Cli;
use crate::error::KvmmError;
use crate::probe::DeviceStatus;
use crate::registry::{Device, DeviceView};

pub mod human;
pub mod robot;

pub use human::HumanOutput;
pub use robot::RobotOutput;

/// One row of a device listing, optionally with reachability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceListing {
    #[serde(flatten)]
    pub device: DeviceView,
    /// True when credentials are stored (the password itself never leaves).
    pub auth: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
}

impl DeviceListing {
    /// Rows for `devices`, pairing each with its status by id.
    pub fn build(devices: &[Device], statuses: Option<&[DeviceStatus]>) -> Vec<Self> {
        devices
            .iter()
            .map(|device| Self {
                device: DeviceView::from(device),
                auth: device.has_credentials(),
                reachable: statuses.and_then(|all| {
                    all.iter()
                        .find(|s| s.id == device.id)
                        .map(|s| s.reachable)
                }),
            })
            .collect()
    }
}

/// Which registry mutation a message reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAction {
    Added,
    Updated,
    Removed,
}

impl DeviceAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Removed => "removed",
        }
    }
}

/// Build metadata shown by `kvmm version`.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
    pub git_sha: &'static str,
    pub git_dirty: bool,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
    pub target: &'static str,
}

/// JSON formatting options for robot mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotFormat {
    /// Pretty-printed JSON (default for --robot).
    Json,
    /// Single-line JSON (--format=json-compact).
    JsonCompact,
}

/// Determines how command output is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// JSON output for scripts and agents.
    Robot(RobotFormat),
    /// Colored terminal output for people.
    Human,
}

impl OutputMode {
    /// Create OutputMode from CLI arguments.
    #[must_use]
    pub const fn from_cli(cli: &Cli) -> Self {
        if cli.use_json() {
            let format = if cli.use_compact_json() {
                RobotFormat::JsonCompact
            } else {
                RobotFormat::Json
            };
            Self::Robot(format)
        } else {
            Self::Human
        }
    }

    /// Returns true if output should be JSON.
    #[must_use]
    pub const fn is_robot(&self) -> bool {
        matches!(self, Self::Robot(_))
    }

    /// Convert into the appropriate Output implementation.
    #[must_use]
    pub fn into_output(self) -> Box<dyn Output> {
        match self {
            Self::Robot(format) => Box::new(RobotOutput::new(format)),
            Self::Human => Box::new(HumanOutput::new()),
        }
    }
}

/// Trait for all output operations.
///
/// Commands call these methods without knowing the output mode.
pub trait Output {
    fn success(&self, message: &str);
    fn error(&self, error: &KvmmError);

    // Registry. URLs passed here never carry credentials.
    fn device_list(&self, devices: &[DeviceListing]);
    fn device_detail(&self, device: &DeviceListing, url: &str);
    fn device_changed(&self, action: DeviceAction, device: &DeviceView);
    fn device_removed(&self, id: &str);
    fn device_url(&self, device: &DeviceView, url: &str, opened: bool);

    // Network
    fn status_report(&self, devices: &[DeviceListing]);

    // Thumbnails
    fn thumbnail_set(&self, id: &str, path: &Path);
    fn thumbnail_cleared(&self, id: &str);
    fn thumbnail_path(&self, id: &str, path: Option<&Path>);

    // Metadata
    fn version_info(&self, info: &VersionInfo);
}
