//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, enums, and subcommand handlers.

mod args;
mod commands;
mod enums;

pub use args::{parse_framerate, parse_resolution, Args, CaptureArgs, Command, ConfigAction};
pub use commands::{
    effective_config, handle_config_action, list_cameras, run_capture, transform_adjustments,
    RunMode,
};
pub use enums::{parse_source, Facing, Preset, Source};
