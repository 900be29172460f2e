//! Overlay transform model.
//!
//! Position is stored as a percentage of the canvas so it survives container
//! resizes. Every setter clamps, so no out-of-range transform can be built
//! through the public API.

use serde::Serialize;

use crate::profile::{EngineProfile, RotationRange, ScaleRange};

/// Bounds applied by the transform setters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TransformLimits {
    pub scale: ScaleRange,
    pub rotation: RotationRange,
}

impl From<&EngineProfile> for TransformLimits {
    fn from(profile: &EngineProfile) -> Self {
        Self {
            scale: profile.scale_range,
            rotation: profile.rotation_range,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayTransform {
    position_x: f32,
    position_y: f32,
    scale_percent: f32,
    rotation_degrees: f32,
    opacity_percent: f32,
    mirrored: bool,
    #[serde(skip)]
    limits: TransformLimits,
}

impl OverlayTransform {
    pub const DEFAULT_POSITION: f32 = 50.0;
    pub const DEFAULT_SCALE: f32 = 100.0;
    pub const DEFAULT_ROTATION: f32 = 0.0;
    pub const DEFAULT_OPACITY: f32 = 100.0;

    pub fn new(limits: TransformLimits) -> Self {
        let mut transform = Self {
            position_x: Self::DEFAULT_POSITION,
            position_y: Self::DEFAULT_POSITION,
            scale_percent: Self::DEFAULT_SCALE,
            rotation_degrees: Self::DEFAULT_ROTATION,
            opacity_percent: Self::DEFAULT_OPACITY,
            mirrored: false,
            limits,
        };
        // A narrow custom scale range may exclude 100
        transform.clamp();
        transform
    }

    pub fn limits(&self) -> TransformLimits {
        self.limits
    }

    /// Restore the documented defaults: (50, 50, 100, 0, 100, not mirrored).
    pub fn reset(&mut self) {
        *self = Self::new(self.limits);
    }

    /// Bring every field back into its valid range.
    pub fn clamp(&mut self) {
        self.position_x = clamp_percent(self.position_x, Self::DEFAULT_POSITION);
        self.position_y = clamp_percent(self.position_y, Self::DEFAULT_POSITION);
        self.scale_percent = clamp_scale(self.limits.scale, self.scale_percent);
        self.rotation_degrees = self.limits.rotation.normalize(self.rotation_degrees);
        self.opacity_percent = clamp_percent(self.opacity_percent, Self::DEFAULT_OPACITY);
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.set_position_x(x);
        self.set_position_y(y);
    }

    pub fn set_position_x(&mut self, x: f32) {
        self.position_x = clamp_percent(x, self.position_x);
    }

    pub fn set_position_y(&mut self, y: f32) {
        self.position_y = clamp_percent(y, self.position_y);
    }

    pub fn set_scale(&mut self, percent: f32) {
        if percent.is_nan() {
            return;
        }
        self.scale_percent = clamp_scale(self.limits.scale, percent);
    }

    pub fn set_rotation(&mut self, degrees: f32) {
        self.rotation_degrees = self.limits.rotation.normalize(degrees);
    }

    pub fn set_opacity(&mut self, percent: f32) {
        self.opacity_percent = clamp_percent(percent, self.opacity_percent);
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    pub fn toggle_mirrored(&mut self) {
        self.mirrored = !self.mirrored;
    }

    pub fn position_x(&self) -> f32 {
        self.position_x
    }

    pub fn position_y(&self) -> f32 {
        self.position_y
    }

    pub fn scale_percent(&self) -> f32 {
        self.scale_percent
    }

    pub fn rotation_degrees(&self) -> f32 {
        self.rotation_degrees
    }

    pub fn opacity_percent(&self) -> f32 {
        self.opacity_percent
    }

    pub fn mirrored(&self) -> bool {
        self.mirrored
    }

    /// Scale as a multiplier of the reference size.
    pub fn scale_factor(&self) -> f64 {
        f64::from(self.scale_percent) / 100.0
    }

    /// Opacity as global alpha in [0, 1].
    pub fn alpha(&self) -> f32 {
        self.opacity_percent / 100.0
    }

    pub fn rotation_radians(&self) -> f64 {
        f64::from(self.rotation_degrees).to_radians()
    }
}

impl Default for OverlayTransform {
    fn default() -> Self {
        Self::new(TransformLimits::default())
    }
}

/// NaN keeps `fallback`; everything else lands in [0, 100].
fn clamp_percent(value: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn clamp_scale(range: ScaleRange, value: f32) -> f32 {
    if value.is_nan() {
        range.clamp(OverlayTransform::DEFAULT_SCALE)
    } else {
        range.clamp(value)
    }
}
