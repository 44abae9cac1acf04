//! Path helpers for the registry file and its thumbnail directory.
//!
//! Supports absolute paths, paths relative to the working directory, and "~"
//! home directory expansion.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{KvmmError, Result};

/// Name of the thumbnail directory beside the registry file.
pub const THUMBNAIL_DIR_NAME: &str = "thumbnails";

/// Resolve the registry file path given on the command line or environment.
///
/// Resolution rules:
/// 1. Paths starting with `~`: expanded to home directory
/// 2. Everything else: used as-is
pub fn resolve_config_path(path: &Path) -> Result<PathBuf> {
    trace!(path = %path.display(), "Resolving config path");

    let path_str = path.to_string_lossy();
    if path_str == "~" || path_str.starts_with("~/") {
        let home = home_dir()?;
        let rest = path_str.strip_prefix("~/").unwrap_or("");
        let resolved = if rest.is_empty() {
            home
        } else {
            home.join(rest)
        };
        debug!(
            original = %path.display(),
            resolved = %resolved.display(),
            "Expanded home directory path"
        );
        return Ok(resolved);
    }

    Ok(path.to_path_buf())
}

/// Resolve the user's home directory (cross-platform).
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| KvmmError::Other("Could not determine home directory".to_string()))
}

/// Directory containing the registry file.
pub fn config_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Thumbnail directory for a registry file.
pub fn thumbnail_dir(config_path: &Path) -> PathBuf {
    config_dir(config_path).join(THUMBNAIL_DIR_NAME)
}

/// File name of a device thumbnail.
pub fn thumbnail_file_name(id: &str, ext: &str) -> String {
    format!("{id}{ext}")
}

/// Whether `id` is safe to use as a file name stem.
pub fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Whether a stored thumbnail reference is a plain file name.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}
