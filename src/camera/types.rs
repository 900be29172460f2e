//! Camera types and data structures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Information about an available camera device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    /// Device index for selection
    pub index: u32,
    /// Human-readable device name
    pub name: String,
    /// Device description
    pub description: String,
}

impl fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.index, self.name, self.description)
    }
}

/// Which physical camera a stream is requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera ("selfie").
    User,
    /// Rear camera, the default for product previews.
    #[default]
    Environment,
}

impl FacingMode {
    /// The opposite camera.
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
        }
    }
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Camera resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Low resolution (640x480)
    pub const LOW: Resolution = Resolution {
        width: 640,
        height: 480,
    };

    /// HD resolution (1280x720), the usual preview hint
    pub const HD: Resolution = Resolution {
        width: 1280,
        height: 720,
    };

    /// Full HD resolution (1920x1080)
    pub const FULL_HD: Resolution = Resolution {
        width: 1920,
        height: 1080,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::HD
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel format of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// RGB format (3 bytes per pixel)
    Rgb,
    /// RGBA format (4 bytes per pixel)
    Rgba,
}

/// A captured camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data, row-major
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format
    pub format: FrameFormat,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl Frame {
    /// Get the number of bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        match self.format {
            FrameFormat::Rgb => 3,
            FrameFormat::Rgba => 4,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Whether the frame holds a full, non-empty image that can be drawn.
    ///
    /// Streams may hand out a frame before the decoder produced a full
    /// buffer; such frames are treated as not ready yet.
    pub fn is_decodable(&self) -> bool {
        let expected = self.width as usize * self.height as usize * self.bytes_per_pixel();
        expected > 0 && self.data.len() == expected
    }
}

/// Parameters for a single stream acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub facing: FacingMode,
    /// Ideal resolution; backends may deliver something else.
    pub resolution_hint: Resolution,
    /// Target FPS (actual may vary)
    pub fps: u32,
}
