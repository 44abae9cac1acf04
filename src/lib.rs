//! kvmm library - registry and thumbnail pipeline for network KVM devices.
//!
//! This library exposes the core functionality of the `kvmm` CLI and web
//! server for use in tests and other front-ends.
//!
//! # Modules
//!
//! - `registry`: Persistent device registry and thumbnail files
//! - `image_ops`: Decode, resize and re-encode thumbnails
//! - `pattern`: Deterministic placeholder thumbnails
//! - `fetch`: Remote thumbnail download
//! - `probe`: TCP reachability checks
//! - `server`: HTTP API
//! - `error`: Error types with user-recoverable hints
//! - `output`: Output mode abstraction (robot/human)
#![forbid(unsafe_code)]

pub mod cli;
pub mod error;
pub mod fetch;
pub mod image_ops;
pub mod logging;
pub mod output;
pub mod pattern;
pub mod probe;
pub mod registry;
pub mod server;
