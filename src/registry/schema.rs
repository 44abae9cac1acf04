//! On-disk and external representations of devices.

use serde::{Deserialize, Serialize};

use crate::error::{KvmmError, Result};
use crate::pattern;

/// Port used when the registry file does not name one.
pub const DEFAULT_PORT: u16 = 8080;

const fn default_port() -> u16 {
    DEFAULT_PORT
}

/// `[server]` section of the registry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    /// Port the HTTP API listens on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

/// Complete contents of the registry file.
///
/// ```toml
/// [server]
/// port = 8080
///
/// [[devices]]
/// id = "4b7e0d1a-..."
/// host = "10.0.0.5"
/// alias = "Rack 1"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub server: ServerSection,
    /// Devices in insertion order.
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// A managed network device as stored in the registry file.
///
/// This type carries the password; use [`DeviceView`] for anything that
/// leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Thumbnail file name inside the thumbnail directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl Device {
    /// Build a new device from validated input.
    pub fn new(id: String, input: DeviceInput) -> Self {
        Self {
            id,
            host: input.host,
            alias: input.alias,
            username: input.username,
            password: input.password,
            thumbnail: None,
        }
    }

    /// Alias if set, host otherwise.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.host)
    }

    /// True when both username and password are set.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Seed for this device's fallback pattern thumbnail.
    pub fn pattern_seed(&self) -> String {
        pattern::device_seed(&self.id, &self.host, self.alias.as_deref())
    }

    /// Replace every caller-editable field, keeping id and thumbnail.
    pub(crate) fn apply(&mut self, input: DeviceInput) {
        self.host = input.host;
        self.alias = input.alias;
        self.username = input.username;
        self.password = input.password;
    }

    /// Clean up values read from disk: empty strings mean "absent".
    pub(crate) fn normalize(&mut self) {
        for field in [
            &mut self.alias,
            &mut self.username,
            &mut self.password,
            &mut self.thumbnail,
        ] {
            if field.as_deref().is_some_and(str::is_empty) {
                *field = None;
            }
        }
    }
}

/// Caller-supplied device fields for add and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeviceInput {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl DeviceInput {
    /// Input with only a host.
    pub fn host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Trim fields, drop empty optionals and require a host.
    pub fn validated(self) -> Result<Self> {
        let host = self.host.trim().to_string();
        if host.is_empty() {
            return Err(KvmmError::Validation("host is required".to_string()));
        }
        if host.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(KvmmError::Validation(format!(
                "host '{host}' must not contain whitespace or '/'"
            )));
        }

        Ok(Self {
            host,
            alias: non_empty(self.alias),
            username: non_empty(self.username),
            // Passwords are kept verbatim; only an empty one means "none".
            password: self.password.filter(|p| !p.is_empty()),
        })
    }
}

/// External representation of a device. Never includes the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceView {
    pub id: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl From<&Device> for DeviceView {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            host: device.host.clone(),
            alias: device.alias.clone(),
            username: device.username.clone(),
            thumbnail: device.thumbnail.clone(),
        }
    }
}

impl From<Device> for DeviceView {
    fn from(device: Device) -> Self {
        Self::from(&device)
    }
}
