//! Configuration file handling for ar-capture.
//!
//! Loads configuration from `<config dir>/ar-capture/config.toml` or a custom path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::camera::{FacingMode, Resolution};
use crate::profile::{EngineProfile, GridSpec, ProfilePreset, RotationRange, ScaleRange};
use crate::snapshot::DownloadSink;

/// Configuration file structure for ar-capture.
/// Loaded from <config dir>/ar-capture/config.toml (or custom path via --config).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub facing: FacingMode,
    /// Requested width; the preset's resolution is used when unset.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    /// Start with the overlay mirrored
    pub mirror: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            width: None,
            height: None,
            fps: None,
            mirror: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub preset: ProfilePreset,
    pub scale_min: Option<f32>,
    pub scale_max: Option<f32>,
    pub rotation: Option<RotationRange>,
    pub base_fraction: Option<f32>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            preset: ProfilePreset::Standard,
            scale_min: None,
            scale_max: None,
            rotation: None,
            base_fraction: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub enabled: bool,
    pub rows: u32,
    pub columns: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rows: GridSpec::THIRDS.rows,
            columns: GridSpec::THIRDS.columns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub prefix: String,
    /// Where snapshots are written; the user's download directory when unset.
    pub directory: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            prefix: DownloadSink::DEFAULT_PREFIX.to_string(),
            directory: None,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            log::debug!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// The preset with every configured override applied.
    pub fn engine_profile(&self) -> EngineProfile {
        let mut profile = EngineProfile::preset(self.profile.preset);

        if self.profile.scale_min.is_some() || self.profile.scale_max.is_some() {
            profile.scale_range = ScaleRange::new(
                self.profile.scale_min.unwrap_or(profile.scale_range.min()),
                self.profile.scale_max.unwrap_or(profile.scale_range.max()),
            );
        }
        if let Some(rotation) = self.profile.rotation {
            profile.rotation_range = rotation;
        }
        if let Some(fraction) = self.profile.base_fraction {
            profile = profile.with_base_fraction(fraction);
        }

        profile.resolution_hint = Resolution::new(
            self.camera.width.unwrap_or(profile.resolution_hint.width),
            self.camera.height.unwrap_or(profile.resolution_hint.height),
        );
        if let Some(fps) = self.camera.fps {
            profile.fps = fps.max(1);
        }
        profile.grid = GridSpec::new(self.grid.columns, self.grid.rows);
        profile
    }

    /// Configured export directory, else the user's downloads, else `.`.
    pub fn export_dir(&self) -> PathBuf {
        self.export
            .directory
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("ar-capture").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/ar-capture/config.toml")
        })
}

/// Commented starter file written by `config init`.
pub const DEFAULT_CONFIG: &str = r#"# ar-capture configuration

[camera]
# Which camera to open: "environment" (rear) or "user" (front)
facing = "environment"
# Requested resolution (best effort; the preset decides when unset)
# width = 1280
# height = 720
# fps = 30
# Start with the overlay mirrored
mirror = false

[profile]
# Preset: standard, mobile, high-res
preset = "standard"
# Overlay scale bounds in percent
# scale_min = 10
# scale_max = 300
# Rotation range: "signed" [-180, 180) or "unsigned" [0, 360)
# rotation = "signed"
# Overlay size at 100% as a fraction of the shorter frame side
# base_fraction = 0.5

[grid]
# Composition guide lines
enabled = false
rows = 3
columns = 3

[export]
# Snapshot file name prefix: <prefix>-<epoch-ms>.png
prefix = "ar-capture"
# Output directory (default: your Downloads folder)
# directory = "/tmp/captures"
"#;
