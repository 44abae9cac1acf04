//! Device registry backed by a TOML file.
//!
//! The registry owns the canonical device list, writes it atomically to disk
//! and manages one thumbnail file per device.
//!
//! # Directory Structure
//!
//! ```text
//! <config dir>/
//! ├── config.toml            # [server] + [[devices]]
//! └── thumbnails/
//!     ├── <device-id>.jpg
//!     └── <device-id>.png
//! ```

pub mod lookup;
pub mod mock;
pub mod path;
mod schema;
mod storage;
mod store;

pub use lookup::{find_device, public_url, redirect_url, Lookup};
pub use path::{resolve_config_path, thumbnail_dir, THUMBNAIL_DIR_NAME};
pub use schema::{Device, DeviceInput, DeviceView, RegistryFile, ServerSection, DEFAULT_PORT};
pub use storage::{temp_path, AtomicFileStorage, Storage};
pub use store::Registry;
