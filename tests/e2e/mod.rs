//! End-to-end tests for the kvmm binary in both output modes.

#[path = "../common/mod.rs"]
mod common;

mod robot_mode;
