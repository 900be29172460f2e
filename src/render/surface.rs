//! Backing raster surface.

use image::RgbaImage;

use crate::camera::{Frame, FrameFormat, Resolution};

/// RGBA8 canvas the render loop draws into.
///
/// Starts empty (0x0) and follows the live video's actual size.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    image: RgbaImage,
    completed_frames: u64,
}

impl RasterSurface {
    pub fn new() -> Self {
        Self {
            image: RgbaImage::new(0, 0),
            completed_frames: 0,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }

    /// Resize to `resolution` if it differs. Returns whether it changed.
    ///
    /// Resizing discards the old contents, so a resized surface counts as
    /// holding no finished composite until the next frame completes.
    pub fn ensure_size(&mut self, resolution: Resolution) -> bool {
        if self.resolution() == resolution {
            return false;
        }
        self.image = RgbaImage::new(resolution.width, resolution.height);
        self.completed_frames = 0;
        true
    }

    /// Copy a video frame in as the opaque base layer.
    pub fn draw_frame(&mut self, frame: &Frame) {
        self.ensure_size(frame.resolution());
        let dst: &mut [u8] = &mut self.image;
        match frame.format {
            FrameFormat::Rgb => {
                for (d, s) in dst.chunks_exact_mut(4).zip(frame.data.chunks_exact(3)) {
                    d[..3].copy_from_slice(s);
                    d[3] = 255;
                }
            }
            FrameFormat::Rgba => {
                for (d, s) in dst.chunks_exact_mut(4).zip(frame.data.chunks_exact(4)) {
                    d[..3].copy_from_slice(&s[..3]);
                    d[3] = 255;
                }
            }
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x < self.image.width() && y < self.image.height() {
            Some(self.image.get_pixel(x, y).0)
        } else {
            None
        }
    }

    pub(crate) fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8; 4] {
        &mut self.image.get_pixel_mut(x, y).0
    }

    pub(crate) fn mark_complete(&mut self) {
        self.completed_frames += 1;
    }

    /// Number of composites finished at the current size.
    pub fn completed_frames(&self) -> u64 {
        self.completed_frames
    }

    /// True once at least one composite has been finished.
    pub fn has_composite(&self) -> bool {
        self.completed_frames > 0
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn rgb_frame(w: u32, h: u32, rgb: [u8; 3]) -> Frame {
        Frame {
            data: rgb.repeat((w * h) as usize),
            width: w,
            height: h,
            format: FrameFormat::Rgb,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn test_starts_empty() {
        let surface = RasterSurface::new();
        assert_eq!(surface.resolution(), Resolution::new(0, 0));
        assert!(!surface.has_composite());
        assert_eq!(surface.pixel(0, 0), None);
    }

    #[test]
    fn test_draw_frame_resizes_and_is_opaque() {
        let mut surface = RasterSurface::new();
        surface.draw_frame(&rgb_frame(3, 2, [1, 2, 3]));
        assert_eq!(surface.resolution(), Resolution::new(3, 2));
        assert_eq!(surface.pixel(2, 1), Some([1, 2, 3, 255]));
    }

    #[test]
    fn test_ensure_size_resets_completion() {
        let mut surface = RasterSurface::new();
        assert!(surface.ensure_size(Resolution::new(4, 4)));
        surface.mark_complete();
        assert!(!surface.ensure_size(Resolution::new(4, 4)));
        assert!(surface.has_composite());
        assert!(surface.ensure_size(Resolution::new(8, 4)));
        assert!(!surface.has_composite());
    }
}
