//! Backend seam between the stream manager and a camera implementation.

use std::future::Future;

use super::error::DeviceFailure;
use super::types::{CameraInfo, Frame, Resolution, StreamRequest};

/// A live video stream owned by the stream manager.
pub trait VideoStream: Send {
    /// Resolution the device actually delivers.
    fn resolution(&self) -> Resolution;

    /// The most recent complete frame, or `None` while the stream warms up.
    fn latest_frame(&mut self) -> Option<Frame>;

    /// Release the underlying device. Must be safe to call more than once.
    fn close(&mut self);
}

/// Something that can open camera streams.
pub trait CameraBackend: Send + 'static {
    type Stream: VideoStream;

    /// Short name used in logs.
    fn name(&self) -> &str;

    /// List the devices this backend can open.
    fn list_devices(&self) -> Result<Vec<CameraInfo>, DeviceFailure>;

    /// Open a stream for `request`. This is the only suspension point of
    /// the whole pipeline.
    fn open(
        &self,
        request: StreamRequest,
    ) -> impl Future<Output = Result<Self::Stream, DeviceFailure>> + Send;
}
