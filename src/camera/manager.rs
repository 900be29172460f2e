//! Device stream manager.
//!
//! Owns at most one live [`VideoStream`] at a time. Every acquisition
//! releases the previous stream first, and every backend failure is
//! classified into a [`StreamErrorKind`] before it is returned.

use super::backend::{CameraBackend, VideoStream};
use super::error::StreamErrorKind;
use super::types::{CameraInfo, FacingMode, Frame, Resolution, StreamRequest};

/// Identifies one successful acquisition.
///
/// The handle is a receipt, not the stream itself: the manager keeps the
/// device, so dropping a handle never leaks or closes anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHandle {
    id: u64,
    facing: FacingMode,
    resolution: Resolution,
}

impl StreamHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    /// Resolution reported by the device when the stream opened.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

struct ActiveStream<S> {
    handle: StreamHandle,
    stream: S,
}

pub struct StreamManager<B: CameraBackend> {
    backend: B,
    active: Option<ActiveStream<B::Stream>>,
    next_id: u64,
    fps: u32,
}

impl<B: CameraBackend> StreamManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            active: None,
            next_id: 1,
            fps: 30,
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn list_devices(&self) -> Result<Vec<CameraInfo>, StreamErrorKind> {
        self.backend.list_devices().map_err(|failure| {
            let kind = failure.classify();
            log::warn!("Listing cameras failed ({}): {:?}", failure, kind);
            kind
        })
    }

    /// Open a stream for `facing`, releasing any stream that is still open.
    pub async fn request_stream(
        &mut self,
        facing: FacingMode,
        resolution_hint: Resolution,
    ) -> Result<StreamHandle, StreamErrorKind> {
        if self.release_active() {
            log::info!("Released previous stream before re-acquiring");
        }

        let request = StreamRequest {
            facing,
            resolution_hint,
            fps: self.fps,
        };
        log::debug!(
            "Requesting {} stream from {} backend at {}",
            facing,
            self.backend.name(),
            resolution_hint
        );

        match self.backend.open(request).await {
            Ok(stream) => {
                let handle = StreamHandle {
                    id: self.next_id,
                    facing,
                    resolution: stream.resolution(),
                };
                self.next_id += 1;
                log::info!(
                    "Stream {} acquired: {} camera at {}",
                    handle.id,
                    facing,
                    handle.resolution
                );
                self.active = Some(ActiveStream { handle, stream });
                Ok(handle)
            }
            Err(failure) => {
                let kind = failure.classify();
                log::warn!("Camera request failed ({}): {:?}", failure, kind);
                Err(kind)
            }
        }
    }

    /// Release the stream identified by `handle`.
    ///
    /// Returns `false` when that stream is no longer active (already
    /// released, or superseded by a newer acquisition).
    pub fn release_stream(&mut self, handle: &StreamHandle) -> bool {
        match &self.active {
            Some(active) if active.handle.id == handle.id => self.release_active(),
            _ => false,
        }
    }

    /// Release whatever stream is open. Safe to call repeatedly.
    pub fn release_active(&mut self) -> bool {
        match self.active.take() {
            Some(mut active) => {
                active.stream.close();
                log::info!("Stream {} released", active.handle.id);
                true
            }
            None => false,
        }
    }

    pub fn active_handle(&self) -> Option<StreamHandle> {
        self.active.as_ref().map(|a| a.handle)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Resolution the live stream reports right now.
    pub fn actual_resolution(&self) -> Option<Resolution> {
        self.active.as_ref().map(|a| a.stream.resolution())
    }

    /// Latest frame of the live stream, if any.
    pub fn latest_frame(&mut self) -> Option<Frame> {
        self.active.as_mut()?.stream.latest_frame()
    }
}

impl<B: CameraBackend> Drop for StreamManager<B> {
    fn drop(&mut self) {
        self.release_active();
    }
}
