//! Application-level orchestration.
//!
//! This module owns campaign lifecycle control (start/stop/snapshot) and the
//! command loop interactive front ends use to drive it. UI/CLI/HTTP layers call
//! into this module and never touch the runner directly.

mod commands;
mod controller;

pub(crate) use commands::{apply_start, run_commands, UiCommand};
pub use controller::RunController;
