//! Common utilities for integration tests

pub mod models;
#[cfg(target_os = "linux")]
pub mod process;
pub mod stub_solver;

pub use models::infiltration_model;
#[cfg(target_os = "linux")]
pub use process::wait_for_exit;
pub use stub_solver::{copying_stub, script_stub, write_fixture_outputs};
