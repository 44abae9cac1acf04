//! Error types for registry, thumbnail and server operations.

use thiserror::Error;

/// Primary error type for kvmm operations.
#[derive(Error, Debug)]
pub enum KvmmError {
    // Registry errors
    #[error("Device not found: {id}")]
    NotFound { id: String },

    #[error("Invalid device: {0}")]
    Validation(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    #[error("Failed to persist registry: {0}")]
    Persistence(String),

    // Image errors
    #[error("Unsupported thumbnail type '{extension}' (allowed: jpg, png, gif, webp)")]
    UnsupportedExtension { extension: String },

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to process image: {0}")]
    Processing(String),

    #[error("Failed to fetch image: {0}")]
    Fetch(String),

    // Web server errors
    #[error("Web server failed to start on {addr}: {reason}")]
    WebServerFailed { addr: String, reason: String },

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl KvmmError {
    /// Builds a `NotFound` error for a device identifier.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Returns true if the error is recoverable by the user.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Validation(_)
                | Self::UnsupportedExtension { .. }
                | Self::Decode(_)
                | Self::Processing(_)
                | Self::Fetch(_)
                | Self::ConfigParse(_)
        )
    }

    /// Returns true if the caller supplied something the core rejected
    /// before touching any state.
    pub const fn is_bad_input(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::UnsupportedExtension { .. }
                | Self::Decode(_)
                | Self::Processing(_)
                | Self::Fetch(_)
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => Some("Run: kvmm list"),
            Self::Validation(_) => Some("Pass a non-empty --host"),
            Self::UnsupportedExtension { .. } => Some("Use a .jpg, .png, .gif or .webp image"),
            Self::ConfigParse(_) => Some("Fix the TOML syntax or point --config at another file"),
            Self::Persistence(_) => Some("Check that the config directory is writable"),
            Self::Fetch(_) => Some("Use an http(s) URL that returns an image"),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using KvmmError.
pub type Result<T> = std::result::Result<T, KvmmError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| KvmmError::Other(format!("{}: {e}", f().into())))
    }
}
