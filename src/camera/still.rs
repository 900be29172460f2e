//! Still-image camera backend.
//!
//! Serves a single decoded photo as if it were a live feed, so overlays can
//! be composited onto an existing room picture.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;

use super::backend::{CameraBackend, VideoStream};
use super::error::DeviceFailure;
use super::types::{CameraInfo, Frame, FrameFormat, Resolution, StreamRequest};

#[derive(Debug, Clone)]
pub struct StillImageBackend {
    path: PathBuf,
    image: Arc<RgbImage>,
}

impl StillImageBackend {
    /// Decode the image at `path`.
    ///
    /// Decode failures are reported as device failures so they surface
    /// through the same classification as a camera that will not open.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, DeviceFailure> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|e| match e {
                image::ImageError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
                    DeviceFailure::named("NotFoundError", format!("{}: {}", path.display(), io))
                }
                image::ImageError::Unsupported(u) => {
                    DeviceFailure::named("NotSupportedError", u.to_string())
                }
                other => DeviceFailure::message(other.to_string()),
            })?
            .to_rgb8();
        Ok(Self::from_image(path.to_path_buf(), image))
    }

    pub fn from_image(path: PathBuf, image: RgbImage) -> Self {
        Self {
            path,
            image: Arc::new(image),
        }
    }
}

impl CameraBackend for StillImageBackend {
    type Stream = StillImageStream;

    fn name(&self) -> &str {
        "still-image"
    }

    fn list_devices(&self) -> Result<Vec<CameraInfo>, DeviceFailure> {
        Ok(vec![CameraInfo {
            index: 0,
            name: self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string()),
            description: format!("{}x{} still image", self.image.width(), self.image.height()),
        }])
    }

    fn open(
        &self,
        _request: StreamRequest,
    ) -> impl Future<Output = Result<Self::Stream, DeviceFailure>> + Send {
        let image = Arc::clone(&self.image);
        async move {
            if image.width() == 0 || image.height() == 0 {
                return Err(DeviceFailure::named("NotReadableError", "image has no pixels"));
            }
            Ok(StillImageStream {
                image: Some(image),
            })
        }
    }
}

/// Stream handed out by [`StillImageBackend`]; every frame is the same photo.
#[derive(Debug)]
pub struct StillImageStream {
    image: Option<Arc<RgbImage>>,
}

impl VideoStream for StillImageStream {
    fn resolution(&self) -> Resolution {
        self.image
            .as_ref()
            .map(|img| Resolution::new(img.width(), img.height()))
            .unwrap_or(Resolution::new(0, 0))
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        let image = self.image.as_ref()?;
        Some(Frame {
            data: image.as_raw().clone(),
            width: image.width(),
            height: image.height(),
            format: FrameFormat::Rgb,
            timestamp: Instant::now(),
        })
    }

    fn close(&mut self) {
        self.image = None;
    }
}
