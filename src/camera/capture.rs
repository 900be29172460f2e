//! Native webcam backend built on nokhwa.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use super::backend::{CameraBackend, VideoStream};
use super::capture_loop::{run_capture_loop, CaptureCommand};
use super::device::{list_devices, select_device};
use super::error::DeviceFailure;
use super::types::{CameraInfo, Frame, Resolution, StreamRequest};

/// Backend that opens real cameras.
#[derive(Debug, Clone, Default)]
pub struct NativeBackend {
    /// Fixed device index; when unset the facing mode picks the device.
    device_index: Option<u32>,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(index: u32) -> Self {
        Self {
            device_index: Some(index),
        }
    }
}

impl CameraBackend for NativeBackend {
    type Stream = NativeStream;

    fn name(&self) -> &str {
        "native"
    }

    fn list_devices(&self) -> Result<Vec<CameraInfo>, DeviceFailure> {
        list_devices()
    }

    fn open(
        &self,
        request: StreamRequest,
    ) -> impl Future<Output = Result<Self::Stream, DeviceFailure>> + Send {
        let fixed = self.device_index;
        async move {
            // Device negotiation blocks; keep it off the async executor
            tokio::task::spawn_blocking(move || {
                let devices = list_devices()?;
                let index = match fixed {
                    Some(index) if devices.iter().any(|d| d.index == index) => index,
                    Some(index) => {
                        return Err(DeviceFailure::named(
                            "NotFoundError",
                            format!("camera device {} not found", index),
                        ))
                    }
                    None => select_device(&devices, request.facing).ok_or_else(|| {
                        DeviceFailure::named("NotFoundError", "no camera devices found")
                    })?,
                };
                NativeStream::start(index, request)
            })
            .await
            .map_err(|e| DeviceFailure::named("AbortError", e.to_string()))?
        }
    }
}

/// Live nokhwa stream.
///
/// The camera runs on a background thread that continuously captures frames
/// and stores the latest complete frame in a shared buffer.
pub struct NativeStream {
    /// Latest captured frame (shared with capture thread)
    frame_buffer: Arc<Mutex<Option<Frame>>>,
    capture_thread: Option<JoinHandle<()>>,
    command_tx: Option<Sender<CaptureCommand>>,
    stop_signal: Arc<AtomicBool>,
    resolution: Resolution,
}

impl std::fmt::Debug for NativeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeStream")
            .field("resolution", &self.resolution)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl NativeStream {
    /// Spawn the capture thread and wait until it reports the negotiated
    /// resolution or an open failure.
    fn start(device_index: u32, request: StreamRequest) -> Result<Self, DeviceFailure> {
        let frame_buffer = Arc::new(Mutex::new(None));
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let (info_tx, info_rx) = mpsc::channel::<Result<Resolution, DeviceFailure>>();

        let buffer = Arc::clone(&frame_buffer);
        let stop = Arc::clone(&stop_signal);
        let handle = std::thread::spawn(move || {
            run_capture_loop(device_index, request, buffer, stop, rx, info_tx);
        });

        let mut stream = Self {
            frame_buffer,
            capture_thread: Some(handle),
            command_tx: Some(tx),
            stop_signal,
            resolution: request.resolution_hint,
        };

        match info_rx.recv() {
            Ok(Ok(resolution)) => {
                stream.resolution = resolution;
                Ok(stream)
            }
            Ok(Err(e)) => {
                stream.close();
                Err(e)
            }
            Err(_) => {
                stream.close();
                Err(DeviceFailure::named(
                    "AbortError",
                    "capture thread terminated unexpectedly",
                ))
            }
        }
    }

    /// Check if the capture thread is currently running.
    pub fn is_running(&self) -> bool {
        self.capture_thread
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl VideoStream for NativeStream {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        let buffer = self.frame_buffer.lock().ok()?;
        buffer.clone()
    }

    fn close(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);

        // Also send stop via the channel in case the thread is mid-frame
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(CaptureCommand::Stop);
        }

        if let Some(handle) = self.capture_thread.take() {
            let _ = handle.join();
        }

        if let Ok(mut buf) = self.frame_buffer.lock() {
            *buf = None;
        }
    }
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        self.close();
    }
}
