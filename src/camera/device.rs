//! Camera device enumeration and facing-mode selection.

use super::types::{CameraInfo, FacingMode};

#[cfg(feature = "native-camera")]
use super::error::DeviceFailure;

/// List all available camera devices on the system.
///
/// If no cameras are found, returns an empty vector (not an error).
#[cfg(feature = "native-camera")]
pub fn list_devices() -> Result<Vec<CameraInfo>, DeviceFailure> {
    use nokhwa::query;
    use nokhwa::utils::ApiBackend;

    let devices = query(ApiBackend::Auto).map_err(|e| DeviceFailure::message(e.to_string()))?;

    Ok(devices
        .into_iter()
        .map(|d| CameraInfo {
            index: d.index().as_index().unwrap_or(0),
            name: d.human_name(),
            description: d.description().to_string(),
        })
        .collect())
}

const USER_HINTS: &[&str] = &["front", "facetime", "user", "integrated", "built-in"];
const ENVIRONMENT_HINTS: &[&str] = &["back", "rear", "environment", "world"];

/// Pick the device that best matches `facing`.
///
/// Desktop webcams rarely report which way they point, so names are matched
/// against common hints first. Without a hint the first device is treated
/// as the user-facing one and the last as the environment-facing one.
pub fn select_device(devices: &[CameraInfo], facing: FacingMode) -> Option<u32> {
    let hints = match facing {
        FacingMode::User => USER_HINTS,
        FacingMode::Environment => ENVIRONMENT_HINTS,
    };

    let by_name = devices.iter().find(|d| {
        let label = format!("{} {}", d.name, d.description).to_lowercase();
        hints.iter().any(|h| label.contains(h))
    });

    by_name
        .or_else(|| match facing {
            FacingMode::User => devices.first(),
            FacingMode::Environment => devices.last(),
        })
        .map(|d| d.index)
}
