//! CLI enum types for facing mode, profile preset and frame source options.

use clap::ValueEnum;
use std::path::PathBuf;

use crate::camera::FacingMode;
use crate::profile::ProfilePreset;

/// Which camera to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Facing {
    /// Front camera
    User,
    /// Rear camera
    #[default]
    Environment,
}

impl From<Facing> for FacingMode {
    fn from(f: Facing) -> Self {
        match f {
            Facing::User => FacingMode::User,
            Facing::Environment => FacingMode::Environment,
        }
    }
}

/// Engine profile preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Preset {
    #[default]
    Standard,
    Mobile,
    HighRes,
}

impl From<Preset> for ProfilePreset {
    fn from(p: Preset) -> Self {
        match p {
            Preset::Standard => ProfilePreset::Standard,
            Preset::Mobile => ProfilePreset::Mobile,
            Preset::HighRes => ProfilePreset::HighRes,
        }
    }
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Source {
    /// Synthetic moving gradient
    #[default]
    TestPattern,
    /// Physical webcam (requires the `native-camera` feature)
    Camera,
    /// A still photo served as a live feed
    Image(PathBuf),
}

/// Parse `test-pattern`, `camera` or `image:<path>`.
pub fn parse_source(s: &str) -> Result<Source, String> {
    match s {
        "test-pattern" => Ok(Source::TestPattern),
        "camera" => Ok(Source::Camera),
        _ => match s.strip_prefix("image:") {
            Some(path) if !path.is_empty() => Ok(Source::Image(PathBuf::from(path))),
            Some(_) => Err("image source needs a path, e.g. image:room.jpg".to_string()),
            None => Err(format!(
                "Unknown source '{}'. Use test-pattern, camera or image:<path>",
                s
            )),
        },
    }
}
