//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::enums::{parse_source, Facing, Preset, Source};
use crate::camera::Resolution;

/// Composite an overlay onto a live camera feed and capture stills
#[derive(Parser, Debug)]
#[command(name = "ar-capture")]
#[command(version, about = "Camera overlay compositor with snapshot export", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available cameras
    ListCameras,
    /// Composite a few frames and save one snapshot
    Snapshot(CaptureArgs),
    /// Run the live preview until Ctrl+C
    Preview {
        #[command(flatten)]
        capture: CaptureArgs,

        /// Save a snapshot every N drawn frames
        #[arg(long)]
        every: Option<u64>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}

/// Options shared by `snapshot` and `preview`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct CaptureArgs {
    /// Frame source: test-pattern, camera or image:<path>
    #[arg(long, default_value = "test-pattern", value_parser = parse_source)]
    pub source: Source,

    /// Camera to open (default from config)
    #[arg(long)]
    pub facing: Option<Facing>,

    /// Camera device index (from list-cameras), overrides --facing
    #[arg(long)]
    pub device: Option<u32>,

    /// Overlay image: a file path or a data: URL
    #[arg(long, short)]
    pub overlay: Option<String>,

    /// Overlay center, percent of the frame width
    #[arg(long)]
    pub x: Option<f32>,

    /// Overlay center, percent of the frame height
    #[arg(long)]
    pub y: Option<f32>,

    /// Overlay scale in percent
    #[arg(long)]
    pub scale: Option<f32>,

    /// Overlay rotation in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub rotation: Option<f32>,

    /// Overlay opacity in percent
    #[arg(long)]
    pub opacity: Option<f32>,

    /// Mirror the overlay horizontally
    #[arg(long)]
    pub mirror: bool,

    /// Draw composition guide lines
    #[arg(long)]
    pub grid: bool,

    /// Engine profile preset (default from config)
    #[arg(long)]
    pub preset: Option<Preset>,

    /// Requested resolution (WIDTHxHEIGHT)
    #[arg(long, value_parser = parse_resolution)]
    pub resolution: Option<Resolution>,

    /// Preview rate in frames per second
    #[arg(long, value_parser = parse_framerate)]
    pub fps: Option<u32>,

    /// Frames to draw (snapshot: before capturing; preview: then stop)
    #[arg(long)]
    pub frames: Option<u64>,

    /// Directory snapshots are written to
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Snapshot file name prefix
    #[arg(long)]
    pub prefix: Option<String>,
}

/// Parse and validate resolution (WIDTHxHEIGHT format)
pub fn parse_resolution(s: &str) -> Result<Resolution, String> {
    let (w, h) = s.split_once('x').ok_or_else(|| {
        format!(
            "Invalid resolution format '{}'. Use WIDTHxHEIGHT (e.g., 1280x720)",
            s
        )
    })?;
    let width: u32 = w
        .parse()
        .map_err(|_| format!("Invalid width '{}' in resolution", w))?;
    let height: u32 = h
        .parse()
        .map_err(|_| format!("Invalid height '{}' in resolution", h))?;
    if width == 0 || height == 0 {
        return Err("Resolution width and height must be greater than 0".to_string());
    }
    if width > 7680 || height > 4320 {
        return Err("Resolution exceeds maximum supported (7680x4320)".to_string());
    }
    Ok(Resolution::new(width, height))
}

/// Parse and validate framerate (1-120 fps)
pub fn parse_framerate(s: &str) -> Result<u32, String> {
    let fps: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid framerate", s))?;
    if !(1..=120).contains(&fps) {
        return Err(format!(
            "Framerate must be between 1 and 120 fps, got {}",
            fps
        ));
    }
    Ok(fps)
}
