//! Common test utilities for kvmm.
//!
//! - `cli`: CLI runner with output verification and fluent assertions
//! - `fixtures`: Test images and temporary registry directories
#![allow(dead_code)]


use tracing_subscriber::EnvFilter;

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
