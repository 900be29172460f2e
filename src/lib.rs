//! ar-capture library crate.
//!
//! Live camera-overlay compositing: acquire a camera stream, draw a
//! user-supplied overlay on top of it with interactive transform controls,
//! and export the composite as a PNG snapshot.

pub mod camera;
pub mod cli;
pub mod config;
pub mod interaction;
pub mod overlay;
pub mod preview;
pub mod profile;
pub mod render;
pub mod session;
pub mod snapshot;
pub mod transform;
