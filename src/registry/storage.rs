//! Durable writes of the registry file.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::error::{KvmmError, Result};

/// Persists serialized registry contents.
///
/// The registry calls this once per successful mutation. Implementations must
/// either replace the file completely or leave the previous contents intact.
pub trait Storage: Send + Sync {
    /// Replace the contents of `path` with `contents`.
    fn persist(&self, path: &Path, contents: &[u8]) -> Result<()>;
}

/// Temp-file-then-rename storage.
///
/// The temporary file lives beside the target so the final rename stays on
/// one filesystem and is atomic.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicFileStorage;

/// Path of the temporary file used while writing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn discard(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp) {
        warn!(path = %tmp.display(), error = %e, "Failed to remove temporary registry file");
    }
}

impl Storage for AtomicFileStorage {
    fn persist(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let dir = parent_dir(path);
        fs::create_dir_all(dir).map_err(|e| {
            KvmmError::Persistence(format!("creating directory {}: {e}", dir.display()))
        })?;

        let tmp = temp_path(path);
        trace!(tmp = %tmp.display(), bytes = contents.len(), "Writing temporary registry file");

        let written = File::create(&tmp).and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        });
        if let Err(e) = written {
            discard(&tmp);
            return Err(KvmmError::Persistence(format!(
                "writing {}: {e}",
                tmp.display()
            )));
        }

        if let Err(e) = fs::rename(&tmp, path) {
            discard(&tmp);
            return Err(KvmmError::Persistence(format!(
                "renaming {} to {}: {e}",
                tmp.display(),
                path.display()
            )));
        }

        debug!(path = %path.display(), "Registry persisted");
        Ok(())
    }
}
