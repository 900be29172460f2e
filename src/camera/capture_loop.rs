//! Background capture thread for the native backend.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat as NokhwaFrameFormat, RequestedFormat,
    RequestedFormatType,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::error::DeviceFailure;
use super::frame_utils::convert_to_rgb;
use super::types::{Frame, Resolution, StreamRequest};

/// Commands sent to the capture thread.
pub enum CaptureCommand {
    Stop,
}

/// Run the capture loop in a background thread.
///
/// Reports the negotiated resolution (or the open failure) on `info_tx`
/// exactly once, then publishes whole frames into `buffer` until stopped.
pub fn run_capture_loop(
    device_index: u32,
    request: StreamRequest,
    buffer: Arc<Mutex<Option<Frame>>>,
    stop: Arc<AtomicBool>,
    rx: Receiver<CaptureCommand>,
    info_tx: Sender<Result<Resolution, DeviceFailure>>,
) {
    let index = CameraIndex::Index(device_index);

    let mut camera = match open_camera_with_fallback(&index, &request) {
        Ok(cam) => cam,
        Err(e) => {
            let _ = info_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        let _ = info_tx.send(Err(DeviceFailure::message(e.to_string())));
        return;
    }

    // The device decides the final size; the request was only a hint
    let res = camera.resolution();
    let actual = Resolution::new(res.width(), res.height());
    log::info!(
        "Camera {} streaming at {} ({} fps requested {})",
        device_index,
        actual,
        camera.frame_rate(),
        request.fps
    );
    let _ = info_tx.send(Ok(actual));

    while !stop.load(Ordering::Relaxed) {
        if let Ok(CaptureCommand::Stop) = rx.try_recv() {
            break;
        }

        if let Ok(raw_frame) = camera.frame() {
            // Undecodable frames are dropped; the render loop just waits
            if let Some(frame) = convert_to_rgb(&raw_frame) {
                if let Ok(mut buf) = buffer.lock() {
                    *buf = Some(frame);
                }
            }
        }

        thread::sleep(Duration::from_millis(1));
    }

    let _ = camera.stop_stream();
    log::info!("Camera {} stream stopped", device_index);
}

/// Try to open a camera with multiple format fallback strategies.
fn open_camera_with_fallback(
    index: &CameraIndex,
    request: &StreamRequest,
) -> Result<Camera, DeviceFailure> {
    let hint = nokhwa::utils::Resolution::new(
        request.resolution_hint.width,
        request.resolution_hint.height,
    );
    // NV12 is native on macOS, MJPEG is the widely supported fallback,
    // and finally let the camera pick whatever works.
    let format_attempts = [
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            hint,
            NokhwaFrameFormat::NV12,
            request.fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            hint,
            NokhwaFrameFormat::MJPEG,
            request.fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution),
    ];

    let mut last_error = None;
    for requested in format_attempts {
        match Camera::new(index.clone(), requested) {
            Ok(cam) => return Ok(cam),
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error
        .map(|e| DeviceFailure::message(e.to_string()))
        .unwrap_or_else(|| DeviceFailure::message("no camera format could be negotiated")))
}
