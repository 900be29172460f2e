//! Subcommand handlers for list-cameras, snapshot, preview and config actions.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use super::args::{CaptureArgs, ConfigAction};
use super::enums::Source;
use crate::camera::{CameraBackend, StillImageBackend, TestPatternBackend};
use crate::config::{default_path, Config, DEFAULT_CONFIG};
use crate::interaction::Adjustment;
use crate::overlay::OverlaySource;
use crate::preview::{run_preview, setup_ctrlc_handler, PreviewOptions};
use crate::session::Session;
use crate::snapshot::{Delivery, DownloadSink};

/// Frames drawn before a one-shot snapshot, so auto-exposure settles.
const DEFAULT_SNAPSHOT_FRAMES: u64 = 10;

/// List available cameras and print them to stdout.
pub fn list_cameras() -> Result<(), String> {
    #[cfg(feature = "native-camera")]
    let devices = crate::camera::list_devices().map_err(|e| e.classify().to_string())?;
    #[cfg(not(feature = "native-camera"))]
    let devices = TestPatternBackend::new()
        .list_devices()
        .map_err(|e| e.classify().to_string())?;

    if devices.is_empty() {
        println!("No cameras found.");
        println!();
        println!("Make sure your camera is connected and permissions are granted.");
        println!("On macOS, grant access in System Settings > Privacy & Security > Camera.");
    } else {
        println!("Available cameras:");
        for device in devices {
            println!("  {}", device);
        }
        println!();
        println!("Use --device <index> to select a camera.");
    }
    if cfg!(not(feature = "native-camera")) {
        println!("(built without the native-camera feature; only synthetic sources are available)");
    }
    Ok(())
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: ConfigAction, path: Option<&Path>) -> Result<(), String> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(default_path);
    match action {
        ConfigAction::Show => {
            let config = Config::load(Some(&config_path)).map_err(|e| e.to_string())?;
            let rendered = config.to_toml().map_err(|e| e.to_string())?;
            println!("Current configuration:");
            println!();
            println!("{}", rendered.trim_end());
            println!();
            println!("Snapshots go to: {}", config.export_dir().display());
            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
        }
        ConfigAction::Init => {
            if config_path.exists() {
                return Err(format!(
                    "Config file already exists: {}\nUse 'ar-capture config show' to view current settings.",
                    config_path.display()
                ));
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Error creating config directory: {}", e))?;
            }
            std::fs::write(&config_path, DEFAULT_CONFIG)
                .map_err(|e| format!("Error writing config file: {}", e))?;
            println!("Created config file: {}", config_path.display());
        }
    }
    Ok(())
}

/// What to do once the session is streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Draw a few frames, save one snapshot.
    Snapshot,
    /// Draw until Ctrl+C (or `--frames`), saving every N frames.
    Preview { every: Option<u64> },
}

/// Run `snapshot` or `preview` on the source picked in `args`.
pub async fn run_capture(args: &CaptureArgs, config: &Config, mode: RunMode) -> Result<(), String> {
    match &args.source {
        Source::TestPattern => run_with(TestPatternBackend::new(), args, config, mode).await,
        Source::Image(path) => {
            let backend = StillImageBackend::open_path(path)
                .map_err(|e| format!("{}: {}", path.display(), e.classify()))?;
            run_with(backend, args, config, mode).await
        }
        Source::Camera => run_camera(args, config, mode).await,
    }
}

#[cfg(feature = "native-camera")]
async fn run_camera(args: &CaptureArgs, config: &Config, mode: RunMode) -> Result<(), String> {
    let backend = match args.device {
        Some(index) => crate::camera::NativeBackend::with_device(index),
        None => crate::camera::NativeBackend::new(),
    };
    run_with(backend, args, config, mode).await
}

#[cfg(not(feature = "native-camera"))]
async fn run_camera(_args: &CaptureArgs, _config: &Config, _mode: RunMode) -> Result<(), String> {
    Err("this build has no camera support; rebuild with --features native-camera".to_string())
}

/// Merge command-line overrides into the loaded config.
pub fn effective_config(args: &CaptureArgs, config: &Config) -> Config {
    let mut config = config.clone();
    if let Some(facing) = args.facing {
        config.camera.facing = facing.into();
    }
    if let Some(resolution) = args.resolution {
        config.camera.width = Some(resolution.width);
        config.camera.height = Some(resolution.height);
    }
    if let Some(fps) = args.fps {
        config.camera.fps = Some(fps);
    }
    if let Some(preset) = args.preset {
        config.profile.preset = preset.into();
    }
    if args.mirror {
        config.camera.mirror = true;
    }
    if args.grid {
        config.grid.enabled = true;
    }
    if let Some(dir) = &args.out_dir {
        config.export.directory = Some(dir.clone());
    }
    if let Some(prefix) = &args.prefix {
        config.export.prefix = prefix.clone();
    }
    config
}

/// Transform changes requested on the command line, in application order.
pub fn transform_adjustments(args: &CaptureArgs, config: &Config) -> Vec<Adjustment> {
    let mut adjustments = Vec::new();
    if args.x.is_some() || args.y.is_some() {
        adjustments.push(Adjustment::Position {
            x: args.x.unwrap_or(50.0),
            y: args.y.unwrap_or(50.0),
        });
    }
    if let Some(scale) = args.scale {
        adjustments.push(Adjustment::Scale(scale));
    }
    if let Some(rotation) = args.rotation {
        adjustments.push(Adjustment::Rotation(rotation));
    }
    if let Some(opacity) = args.opacity {
        adjustments.push(Adjustment::Opacity(opacity));
    }
    if config.camera.mirror {
        adjustments.push(Adjustment::Mirror(true));
    }
    adjustments
}

async fn run_with<B: CameraBackend>(
    backend: B,
    args: &CaptureArgs,
    config: &Config,
    mode: RunMode,
) -> Result<(), String> {
    let config = effective_config(args, config);
    let profile = config.engine_profile();
    let mut session = Session::new(backend, profile);

    if let Some(overlay) = &args.overlay {
        session
            .load_overlay(OverlaySource::from_arg(overlay))
            .await
            .map_err(|e| e.to_string())?;
    }
    session.set_grid_enabled(config.grid.enabled);

    let handle = session
        .start(config.camera.facing)
        .await
        .map_err(|e| e.to_string())?;
    println!(
        "Streaming from {} ({} camera, {})",
        session.backend().name(),
        handle.facing(),
        handle.resolution()
    );

    for adjustment in transform_adjustments(args, &config) {
        session.adjust(adjustment).map_err(|e| e.to_string())?;
    }

    let mut sink = DownloadSink::new(config.export_dir()).with_prefix(config.export.prefix.clone());
    let result = match mode {
        RunMode::Snapshot => {
            let options = PreviewOptions {
                fps: profile.fps,
                max_frames: Some(args.frames.unwrap_or(DEFAULT_SNAPSHOT_FRAMES).max(1)),
                ..PreviewOptions::default()
            };
            let never = AtomicBool::new(false);
            run_preview(&mut session, options, &never, &mut sink)
                .await
                .and_then(|_| session.capture_to(&mut sink))
                .map(|delivery| print_delivery(&delivery))
        }
        RunMode::Preview { every } => {
            let stop = setup_ctrlc_handler().map_err(|e| e.to_string())?;
            let options = PreviewOptions {
                fps: profile.fps,
                max_frames: args.frames,
                capture_every: every,
                ..PreviewOptions::default()
            };
            println!("Previewing at {} fps, press Ctrl+C to stop", profile.fps);
            run_preview(&mut session, options, &stop, &mut sink)
                .await
                .map(|report| {
                    for delivery in &report.deliveries {
                        print_delivery(delivery);
                    }
                    println!(
                        "Drew {} frames ({} skipped), saved {} snapshots",
                        report.drawn,
                        report.skipped,
                        report.deliveries.len()
                    );
                })
        }
    };

    session.shutdown();
    result.map_err(|e| e.to_string())
}

fn print_delivery(delivery: &Delivery) {
    match delivery {
        Delivery::Saved(path) => println!("Saved snapshot: {}", path.display()),
        Delivery::Handed => println!("Snapshot handed off"),
        Delivery::PendingReview => println!("Snapshot waiting for review"),
    }
}
