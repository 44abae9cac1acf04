//! The device registry: in-memory state, persistence and thumbnail files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use super::path::{self, is_safe_file_name, is_safe_id, thumbnail_file_name};
use super::schema::{Device, DeviceInput, RegistryFile};
use super::storage::{AtomicFileStorage, Storage};
use crate::error::{KvmmError, Result};
use crate::image_ops::{self, THUMBNAIL_EXTENSION};
use crate::pattern;

/// Thumbnail bytes written beside their final name, awaiting commit.
struct StagedThumbnail {
    staging: PathBuf,
    target: PathBuf,
    file_name: String,
}

impl StagedThumbnail {
    fn commit(&self) -> Result<()> {
        fs::rename(&self.staging, &self.target).map_err(|e| {
            KvmmError::Persistence(format!(
                "moving thumbnail into place at {}: {e}",
                self.target.display()
            ))
        })
    }

    fn discard(&self) {
        remove_best_effort(&self.staging);
    }
}

fn remove_best_effort(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => trace!(path = %path.display(), "Removed thumbnail file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Thumbnail file already absent");
        }
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove thumbnail file"),
    }
}

fn position(file: &RegistryFile, id: &str) -> Result<usize> {
    file.devices
        .iter()
        .position(|d| d.id == id)
        .ok_or_else(|| KvmmError::not_found(id))
}

/// Parse registry file contents, normalizing and checking entries.
fn parse(content: &str) -> Result<RegistryFile> {
    let mut file: RegistryFile =
        toml::from_str(content).map_err(|e| KvmmError::ConfigParse(e.to_string()))?;

    let mut seen = std::collections::HashSet::new();
    let mut claimed = std::collections::HashSet::new();
    for device in &mut file.devices {
        device.normalize();
        if device.id.is_empty() {
            continue;
        }
        if !is_safe_id(&device.id) {
            return Err(KvmmError::ConfigParse(format!(
                "invalid device id '{}': only letters, digits, '-' and '_' are allowed",
                device.id
            )));
        }
        if !seen.insert(device.id.clone()) {
            return Err(KvmmError::ConfigParse(format!(
                "duplicate device id '{}'",
                device.id
            )));
        }
        if device
            .thumbnail
            .as_deref()
            .is_some_and(|name| !is_safe_file_name(name))
        {
            warn!(id = %device.id, "Ignoring thumbnail reference outside the thumbnail directory");
            device.thumbnail = None;
        }
        // A file belongs to the first device naming it; later ones get a fresh pattern.
        if let Some(name) = device.thumbnail.clone() {
            if !claimed.insert(name) {
                warn!(id = %device.id, "Ignoring thumbnail already used by another device");
                device.thumbnail = None;
            }
        }
    }
    Ok(file)
}

/// Persisted registry of devices.
///
/// All operations are serialized by one readers-writer lock. Mutations build
/// the next state from a copy, persist it, and only then publish it, so a
/// failed write leaves the registry exactly as it was and readers never see
/// a state that is not on disk.
pub struct Registry {
    config_path: PathBuf,
    thumbnail_dir: PathBuf,
    storage: Arc<dyn Storage>,
    state: RwLock<RegistryFile>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config_path", &self.config_path)
            .field("thumbnail_dir", &self.thumbnail_dir)
            .field("devices", &self.read().devices.len())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Load the registry at `path`, creating it when absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_storage(path, Arc::new(AtomicFileStorage))
    }

    /// Load the registry using a specific storage backend.
    ///
    /// Entries without an id get one, and entries without a usable thumbnail
    /// get a generated pattern.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_with_storage(path: impl AsRef<Path>, storage: Arc<dyn Storage>) -> Result<Self> {
        let config_path = path.as_ref().to_path_buf();
        let thumbnail_dir = path::thumbnail_dir(&config_path);

        let (file, created) = match fs::read_to_string(&config_path) {
            Ok(content) => (parse(&content)?, false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (RegistryFile::default(), true),
            Err(e) => return Err(e.into()),
        };

        let registry = Self {
            config_path,
            thumbnail_dir,
            storage,
            state: RwLock::new(file),
        };

        if created {
            registry.persist(&registry.read())?;
            info!("Created new registry file");
        }

        let assigned = registry.assign_missing_ids();
        let generated = registry.generate_missing_thumbnails();
        if assigned > 0 && generated == 0 {
            registry.persist(&registry.read())?;
        }

        info!(
            devices = registry.len(),
            assigned, generated, "Registry loaded"
        );
        Ok(registry)
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryFile> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryFile> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, file: &RegistryFile) -> Result<()> {
        let contents = toml::to_string_pretty(file)
            .map_err(|e| KvmmError::Persistence(format!("encoding registry: {e}")))?;
        self.storage.persist(&self.config_path, contents.as_bytes())
    }

    fn assign_missing_ids(&self) -> usize {
        let mut state = self.write();
        let mut assigned = 0;
        for device in state.devices.iter_mut().filter(|d| d.id.is_empty()) {
            device.id = Uuid::new_v4().to_string();
            debug!(id = %device.id, host = %device.host, "Assigned device id");
            assigned += 1;
        }
        assigned
    }

    fn needs_thumbnail(&self, device: &Device) -> bool {
        device
            .thumbnail
            .as_deref()
            .is_none_or(|name| !self.thumbnail_dir.join(name).is_file())
    }

    fn generate_missing_thumbnails(&self) -> usize {
        let pending: Vec<(String, String)> = self
            .read()
            .devices
            .iter()
            .filter(|d| self.needs_thumbnail(d))
            .map(|d| (d.id.clone(), d.pattern_seed()))
            .collect();

        let mut generated = 0;
        for (id, seed) in pending {
            let result = pattern::generate_pattern_thumbnail(&seed)
                .and_then(|bytes| self.set_thumbnail(&id, &bytes, THUMBNAIL_EXTENSION));
            match result {
                Ok(()) => generated += 1,
                Err(e) => warn!(id = %id, error = %e, "Failed to generate pattern thumbnail"),
            }
        }
        generated
    }

    fn stage_thumbnail(&self, id: &str, data: &[u8], ext: &str) -> Result<StagedThumbnail> {
        fs::create_dir_all(&self.thumbnail_dir).map_err(|e| {
            KvmmError::Persistence(format!(
                "creating thumbnail dir {}: {e}",
                self.thumbnail_dir.display()
            ))
        })?;

        let file_name = thumbnail_file_name(id, ext);
        let staging = self.thumbnail_dir.join(format!(".{file_name}.tmp"));
        fs::write(&staging, data).map_err(|e| {
            remove_best_effort(&staging);
            KvmmError::Persistence(format!("saving thumbnail: {e}"))
        })?;

        trace!(staging = %staging.display(), bytes = data.len(), "Staged thumbnail");
        Ok(StagedThumbnail {
            target: self.thumbnail_dir.join(&file_name),
            staging,
            file_name,
        })
    }

    fn remove_thumbnail_file(&self, file_name: &str) {
        remove_best_effort(&self.thumbnail_dir.join(file_name));
    }

    // === Queries ===

    /// Copy of all devices in insertion order.
    pub fn list(&self) -> Vec<Device> {
        self.read().devices.clone()
    }

    /// Device with the given id.
    pub fn get(&self, id: &str) -> Result<Device> {
        let state = self.read();
        let index = position(&state, id)?;
        Ok(state.devices[index].clone())
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.read().devices.len()
    }

    /// True when no devices are registered.
    pub fn is_empty(&self) -> bool {
        self.read().devices.is_empty()
    }

    /// Port from the `[server]` section.
    pub fn port(&self) -> u16 {
        self.read().server.port
    }

    /// Location of the registry file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Directory holding thumbnail files.
    pub fn thumbnail_dir(&self) -> &Path {
        &self.thumbnail_dir
    }

    /// Full path of a device's thumbnail, if it has one.
    pub fn thumbnail_path(&self, id: &str) -> Option<PathBuf> {
        self.read()
            .devices
            .iter()
            .find(|d| d.id == id)
            .and_then(|d| d.thumbnail.as_deref())
            .map(|name| self.thumbnail_dir.join(name))
    }

    // === Mutations ===

    /// Register a new device with a generated id and pattern thumbnail.
    #[instrument(skip_all, fields(host = %input.host))]
    pub fn add(&self, input: DeviceInput) -> Result<Device> {
        let input = input.validated()?;
        let mut device = Device::new(Uuid::new_v4().to_string(), input);

        let pattern = pattern::generate_pattern_thumbnail(&device.pattern_seed())
            .inspect_err(|e| warn!(error = %e, "Pattern generation failed, adding without thumbnail"))
            .ok();

        let mut state = self.write();

        let staged = pattern.and_then(|bytes| {
            self.stage_thumbnail(&device.id, &bytes, THUMBNAIL_EXTENSION)
                .inspect_err(|e| warn!(error = %e, "Could not stage thumbnail, adding without it"))
                .ok()
        });
        device.thumbnail = staged.as_ref().map(|s| s.file_name.clone());

        let mut next = state.clone();
        next.devices.push(device.clone());

        if let Err(e) = self.persist(&next) {
            if let Some(staged) = &staged {
                staged.discard();
            }
            return Err(e);
        }

        if let Some(staged) = &staged {
            if let Err(e) = staged.commit() {
                // The reference is durable; the next load regenerates the file.
                warn!(id = %device.id, error = %e, "Failed to commit generated thumbnail");
                staged.discard();
            }
        }

        *state = next;
        info!(id = %device.id, "Device added");
        Ok(device)
    }

    /// Replace host, alias and credentials of a device.
    ///
    /// Identifier and thumbnail are preserved.
    #[instrument(skip(self, input))]
    pub fn update(&self, id: &str, input: DeviceInput) -> Result<Device> {
        let input = input.validated()?;

        let mut state = self.write();
        let index = position(&state, id)?;

        let mut next = state.clone();
        next.devices[index].apply(input);
        self.persist(&next)?;

        let updated = next.devices[index].clone();
        *state = next;
        info!("Device updated");
        Ok(updated)
    }

    /// Remove a device and its thumbnail file.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.write();
        let index = position(&state, id)?;

        let mut next = state.clone();
        let removed = next.devices.remove(index);
        self.persist(&next)?;
        *state = next;

        if let Some(name) = removed.thumbnail.as_deref() {
            self.remove_thumbnail_file(name);
        }
        info!("Device deleted");
        Ok(())
    }

    /// Store new thumbnail bytes for a device as `<id><ext>`.
    ///
    /// The bytes are stored as given; callers run user images through
    /// [`image_ops::process_thumbnail`] first. If the registry cannot be
    /// persisted, the new file is removed and the previous thumbnail is kept.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub fn set_thumbnail(&self, id: &str, data: &[u8], ext: &str) -> Result<()> {
        let ext = image_ops::normalize_extension(ext)?;

        let mut state = self.write();
        let index = position(&state, id)?;

        let staged = self.stage_thumbnail(id, data, &ext)?;

        let mut next = state.clone();
        let previous = next.devices[index]
            .thumbnail
            .replace(staged.file_name.clone());

        if let Err(e) = self.persist(&next) {
            staged.discard();
            return Err(e);
        }

        if let Err(e) = staged.commit() {
            staged.discard();
            // Put the previous reference back on disk.
            match self.persist(&state) {
                Ok(()) => {}
                Err(restore) => {
                    warn!(error = %restore, "Failed to restore previous registry after thumbnail error");
                    *state = next;
                }
            }
            return Err(e);
        }

        *state = next;

        if let Some(old) = previous.filter(|old| *old != staged.file_name) {
            self.remove_thumbnail_file(&old);
        }
        info!(file = %staged.file_name, "Thumbnail set");
        Ok(())
    }

    /// Drop a device's thumbnail reference and file.
    ///
    /// A missing file is not an error.
    #[instrument(skip(self))]
    pub fn delete_thumbnail(&self, id: &str) -> Result<()> {
        let mut state = self.write();
        let index = position(&state, id)?;

        let Some(name) = state.devices[index].thumbnail.clone() else {
            debug!("Device has no thumbnail");
            return Ok(());
        };

        let mut next = state.clone();
        next.devices[index].thumbnail = None;
        self.persist(&next)?;
        *state = next;

        self.remove_thumbnail_file(&name);
        info!("Thumbnail deleted");
        Ok(())
    }
}
