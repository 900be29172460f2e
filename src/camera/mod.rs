//! Camera stream acquisition.
//!
//! - Backends implement [`CameraBackend`] / [`VideoStream`]
//! - [`StreamManager`] owns the single live stream and classifies failures
//! - [`StreamErrorKind`] is the only error type that leaves this module

mod backend;
#[cfg(feature = "native-camera")]
mod capture;
#[cfg(feature = "native-camera")]
mod capture_loop;
mod device;
mod error;
#[cfg(feature = "native-camera")]
mod frame_utils;
mod manager;
mod still;
mod synthetic;
mod types;

pub use backend::{CameraBackend, VideoStream};
#[cfg(feature = "native-camera")]
pub use capture::{NativeBackend, NativeStream};
#[cfg(feature = "native-camera")]
pub use device::list_devices;
pub use device::select_device;
pub use error::{DeviceFailure, StreamErrorKind};
pub use manager::{StreamHandle, StreamManager};
pub use still::{StillImageBackend, StillImageStream};
pub use synthetic::{StreamStats, TestPatternBackend, TestPatternStream};
pub use types::{CameraInfo, FacingMode, Frame, FrameFormat, Resolution, StreamRequest};
