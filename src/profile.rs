//! Engine profiles.
//!
//! The preview screens that embed the compositor differ only in a handful
//! of parameters. A profile names those parameters so a single engine can
//! be instantiated per call site.

use serde::{Deserialize, Serialize};

use crate::camera::Resolution;

/// Allowed overlay scale, in percent of the reference size.
///
/// Always built through [`ScaleRange::new`], deserialization included, so
/// `min <= max` and both bounds are finite and positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawScaleRange")]
pub struct ScaleRange {
    min: f32,
    max: f32,
}

#[derive(Deserialize)]
struct RawScaleRange {
    min: f32,
    max: f32,
}

impl From<RawScaleRange> for ScaleRange {
    fn from(raw: RawScaleRange) -> Self {
        ScaleRange::new(raw.min, raw.max)
    }
}

impl ScaleRange {
    pub const DEFAULT: ScaleRange = ScaleRange {
        min: 10.0,
        max: 300.0,
    };

    /// Build a range, swapping the bounds if given in the wrong order.
    /// Non-finite or non-positive bounds fall back to the defaults.
    pub fn new(min: f32, max: f32) -> Self {
        let min = if min.is_finite() && min > 0.0 { min } else { Self::DEFAULT.min };
        let max = if max.is_finite() && max > 0.0 { max } else { Self::DEFAULT.max };
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Clamp `value` into the range. NaN maps to the lower bound.
    pub fn clamp(&self, value: f32) -> f32 {
        let lo = self.min.min(self.max);
        let hi = self.min.max(self.max);
        value.max(lo).min(hi)
    }

    pub fn contains(&self, value: f32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl Default for ScaleRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Convention used to store overlay rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationRange {
    /// [-180, 180)
    #[default]
    Signed,
    /// [0, 360)
    Unsigned,
}

impl RotationRange {
    /// Wrap `degrees` into this range. Non-finite input becomes 0.
    pub fn normalize(&self, degrees: f32) -> f32 {
        if !degrees.is_finite() {
            return 0.0;
        }
        let wrapped = degrees.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negative inputs
        let wrapped = if wrapped >= 360.0 { 0.0 } else { wrapped };
        match self {
            RotationRange::Unsigned => wrapped,
            RotationRange::Signed if wrapped >= 180.0 => wrapped - 360.0,
            RotationRange::Signed => wrapped,
        }
    }

    /// Inclusive lower and exclusive upper bound.
    pub fn bounds(&self) -> (f32, f32) {
        match self {
            RotationRange::Signed => (-180.0, 180.0),
            RotationRange::Unsigned => (0.0, 360.0),
        }
    }
}

/// Guide grid drawn over the video: `columns` x `rows` cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    pub columns: u32,
    pub rows: u32,
}

impl GridSpec {
    pub const THIRDS: GridSpec = GridSpec { columns: 3, rows: 3 };
    /// Most cells allowed along either axis.
    pub const MAX_CELLS: u32 = 32;

    pub fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }.clamped()
    }

    /// Same grid with both axes in `1..=MAX_CELLS`.
    pub fn clamped(self) -> Self {
        Self {
            columns: self.columns.clamp(1, Self::MAX_CELLS),
            rows: self.rows.clamp(1, Self::MAX_CELLS),
        }
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::THIRDS
    }
}

/// Named parameter sets for the preview screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfilePreset {
    /// HD preview with the full scale range
    #[default]
    Standard,
    /// Low-resolution preview for phones, narrower scale range
    Mobile,
    /// Full HD preview with degrees stored as [0, 360)
    HighRes,
}

/// Everything that differs between compositor instances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineProfile {
    pub resolution_hint: Resolution,
    pub scale_range: ScaleRange,
    pub rotation_range: RotationRange,
    pub grid: GridSpec,
    /// Overlay reference size as a fraction of the canvas' shorter side.
    /// At 100% scale the overlay's longer side spans this fraction.
    pub base_fraction: f32,
    pub fps: u32,
}

impl EngineProfile {
    pub fn preset(preset: ProfilePreset) -> Self {
        match preset {
            ProfilePreset::Standard => Self {
                resolution_hint: Resolution::HD,
                scale_range: ScaleRange::DEFAULT,
                rotation_range: RotationRange::Signed,
                grid: GridSpec::THIRDS,
                base_fraction: 0.5,
                fps: 30,
            },
            ProfilePreset::Mobile => Self {
                resolution_hint: Resolution::LOW,
                scale_range: ScaleRange::new(10.0, 200.0),
                rotation_range: RotationRange::Signed,
                grid: GridSpec::THIRDS,
                base_fraction: 0.6,
                fps: 24,
            },
            ProfilePreset::HighRes => Self {
                resolution_hint: Resolution::FULL_HD,
                scale_range: ScaleRange::DEFAULT,
                rotation_range: RotationRange::Unsigned,
                grid: GridSpec::THIRDS,
                base_fraction: 0.5,
                fps: 30,
            },
        }
    }

    pub fn with_base_fraction(mut self, fraction: f32) -> Self {
        if fraction.is_finite() && fraction > 0.0 {
            self.base_fraction = fraction.min(1.0);
        }
        self
    }
}

impl Default for EngineProfile {
    fn default() -> Self {
        Self::preset(ProfilePreset::Standard)
    }
}
