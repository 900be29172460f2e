//! Overlay asset loading.
//!
//! Overlays arrive as opaque assets (raw bytes, a file, or a `data:` URL)
//! and are decoded in an explicit async step. The result is an immutable,
//! shareable [`OverlayImage`]; the render loop only ever sees finished ones.

use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine;
use image::RgbaImage;

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(&'static str),
    #[error("data URL payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to read overlay '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode overlay image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("overlay image has no pixels")]
    Empty,
    #[error("overlay image is {width}x{height}, larger than {max} pixels on a side")]
    TooLarge { width: u32, height: u32, max: u32 },
    #[error("overlay decoding was cancelled: {0}")]
    Cancelled(String),
}

/// Where an overlay comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlaySource {
    Bytes(Vec<u8>),
    DataUrl(String),
    Path(PathBuf),
}

impl OverlaySource {
    /// Interpret a CLI/user string: `data:` URLs stay URLs, anything else
    /// is a file path.
    pub fn from_arg(value: &str) -> Self {
        if value.starts_with("data:") {
            OverlaySource::DataUrl(value.to_string())
        } else {
            OverlaySource::Path(PathBuf::from(value))
        }
    }
}

/// A decoded overlay. Cloning shares the pixels.
///
/// Besides the straight-alpha pixels, the overlay keeps a premultiplied
/// copy ready to be used as a rasterizer paint.
#[derive(Clone)]
pub struct OverlayImage {
    pixels: Arc<RgbaImage>,
    paint: vello_cpu::Image,
}

impl OverlayImage {
    /// Largest side the rasterizer accepts.
    pub const MAX_SIDE: u32 = u16::MAX as u32;

    pub fn from_rgba(image: RgbaImage) -> Result<Self, OverlayError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OverlayError::Empty);
        }
        let too_large = || OverlayError::TooLarge {
            width,
            height,
            max: Self::MAX_SIDE,
        };
        let w: u16 = width.try_into().map_err(|_| too_large())?;
        let h: u16 = height.try_into().map_err(|_| too_large())?;

        // Pixmap stores PremulRgba8
        let premul = image
            .pixels()
            .map(|px| {
                let [r, g, b, a] = px.0;
                let a16 = u16::from(a);
                let premul = |c: u8| -> u8 { ((u16::from(c) * a16 + 127) / 255) as u8 };
                vello_cpu::peniko::color::PremulRgba8::from_u8_array([
                    premul(r),
                    premul(g),
                    premul(b),
                    a,
                ])
            })
            .collect::<Vec<_>>();
        let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(premul, w, h, true);
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };

        Ok(Self {
            pixels: Arc::new(image),
            paint,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub(crate) fn paint(&self) -> &vello_cpu::Image {
        &self.paint
    }
}

impl std::fmt::Debug for OverlayImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Decode `source` on the current thread.
pub fn decode_overlay(source: OverlaySource) -> Result<OverlayImage, OverlayError> {
    let bytes = match source {
        OverlaySource::Bytes(bytes) => bytes,
        OverlaySource::DataUrl(url) => parse_data_url(&url)?,
        OverlaySource::Path(path) => {
            std::fs::read(&path).map_err(|source| OverlayError::Io { path, source })?
        }
    };
    let decoded = image::load_from_memory(&bytes)?;
    OverlayImage::from_rgba(decoded.to_rgba8())
}

/// Decode `source` on the blocking pool.
pub async fn load_overlay(source: OverlaySource) -> Result<OverlayImage, OverlayError> {
    tokio::task::spawn_blocking(move || decode_overlay(source))
        .await
        .map_err(|e| OverlayError::Cancelled(e.to_string()))?
}

/// Extract the payload of a base64 `data:` URL.
pub fn parse_data_url(url: &str) -> Result<Vec<u8>, OverlayError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or(OverlayError::InvalidDataUrl("missing 'data:' scheme"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or(OverlayError::InvalidDataUrl("missing ',' separator"))?;
    if !meta.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        return Err(OverlayError::InvalidDataUrl("only base64 payloads are supported"));
    }
    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 128]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_bytes() {
        let overlay = decode_overlay(OverlaySource::Bytes(png_bytes(3, 2))).unwrap();
        assert_eq!((overlay.width(), overlay.height()), (3, 2));
        assert_eq!(overlay.pixels().get_pixel(0, 0), &Rgba([255, 0, 0, 128]));
    }

    #[test]
    fn test_decode_data_url() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(2, 2));
        let url = format!("data:image/png;base64,{}", encoded);
        let overlay = decode_overlay(OverlaySource::from_arg(&url)).unwrap();
        assert_eq!(overlay.width(), 2);
    }

    #[test]
    fn test_data_url_errors() {
        assert!(matches!(
            parse_data_url("image/png;base64,AAAA"),
            Err(OverlayError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            parse_data_url("data:image/png;base64"),
            Err(OverlayError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            parse_data_url("data:text/plain,hello"),
            Err(OverlayError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            parse_data_url("data:image/png;base64,!!!"),
            Err(OverlayError::Base64(_))
        ));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let err = decode_overlay(OverlaySource::Bytes(vec![1, 2, 3, 4])).unwrap_err();
        assert!(matches!(err, OverlayError::Decode(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = decode_overlay(OverlaySource::from_arg("/no/such/overlay.png")).unwrap_err();
        assert!(matches!(err, OverlayError::Io { .. }));
    }

    #[test]
    fn test_empty_image_rejected() {
        assert!(matches!(
            OverlayImage::from_rgba(RgbaImage::new(0, 4)),
            Err(OverlayError::Empty)
        ));
    }

    #[test]
    fn test_oversized_image_rejected() {
        assert!(matches!(
            OverlayImage::from_rgba(RgbaImage::new(OverlayImage::MAX_SIDE + 1, 1)),
            Err(OverlayError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_overlay_async() {
        let overlay = load_overlay(OverlaySource::Bytes(png_bytes(4, 4))).await.unwrap();
        assert_eq!(overlay.height(), 4);
    }
}
