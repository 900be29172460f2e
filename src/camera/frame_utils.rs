//! Frame conversion utilities for the native backend.

use nokhwa::pixel_format::RgbFormat;
use std::time::Instant;

use super::types::{Frame, FrameFormat};

/// Convert a nokhwa buffer to our RGB Frame format.
///
/// Handles various camera formats (MJPEG, YUYV, NV12, etc.) by using
/// nokhwa's built-in decode_image which automatically converts from
/// the camera's native format to RGB.
///
/// Returns `None` if the conversion fails (unsupported format or corrupt data).
pub fn convert_to_rgb(buffer: &nokhwa::Buffer) -> Option<Frame> {
    let decoded = buffer.decode_image::<RgbFormat>().ok()?;
    let resolution = buffer.resolution();

    let frame = Frame {
        data: decoded.into_raw(),
        width: resolution.width(),
        height: resolution.height(),
        format: FrameFormat::Rgb,
        timestamp: Instant::now(),
    };
    // A truncated MJPEG payload can decode to a short buffer
    frame.is_decodable().then_some(frame)
}
