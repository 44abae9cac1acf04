//! Storage double for exercising persistence failures.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kvmm::registry::{Registry, mock::FlakyStorage};
//!
//! let storage = Arc::new(FlakyStorage::new());
//! let registry = Registry::load_with_storage(path, storage.clone())?;
//!
//! storage.set_failing(true);
//! assert!(registry.add(DeviceInput::host("10.0.0.5")).is_err());
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::debug;

use super::storage::{AtomicFileStorage, Storage};
use crate::error::{KvmmError, Result};

/// Atomic file storage that can be switched into a failing mode.
#[derive(Debug, Default)]
pub struct FlakyStorage {
    inner: AtomicFileStorage,
    failing: AtomicBool,
    writes: AtomicUsize,
    rejected: AtomicUsize,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following persist fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful writes.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of writes refused while failing.
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

impl Storage for FlakyStorage {
    fn persist(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            debug!(path = %path.display(), "Injected persistence failure");
            return Err(KvmmError::Persistence("injected failure".to_string()));
        }
        self.inner.persist(path, contents)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
