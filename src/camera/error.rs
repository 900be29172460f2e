//! Stream failure taxonomy.
//!
//! Backends report raw [`DeviceFailure`]s. The stream manager converts every
//! one of them into exactly one [`StreamErrorKind`] before it leaves the
//! camera module, so callers only ever see the closed set below.

use serde::Serialize;
use std::fmt;

/// Why a camera stream could not be acquired (or was lost).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamErrorKind {
    /// The platform or context cannot provide camera access at all
    Unsupported,
    /// The user or the OS refused camera access
    PermissionDenied,
    /// No camera matches the request
    DeviceNotFound,
    /// The camera exists but another application holds it
    DeviceBusy,
    /// The request was aborted before it completed
    Interrupted,
    /// Anything the classifier does not recognise
    Unknown,
}

impl StreamErrorKind {
    pub const ALL: [StreamErrorKind; 6] = [
        StreamErrorKind::Unsupported,
        StreamErrorKind::PermissionDenied,
        StreamErrorKind::DeviceNotFound,
        StreamErrorKind::DeviceBusy,
        StreamErrorKind::Interrupted,
        StreamErrorKind::Unknown,
    ];

    /// What went wrong, in user-facing words.
    pub fn message(&self) -> &'static str {
        match self {
            StreamErrorKind::Unsupported => "Camera access is not supported here",
            StreamErrorKind::PermissionDenied => "Camera permission was denied",
            StreamErrorKind::DeviceNotFound => "No camera was found",
            StreamErrorKind::DeviceBusy => "The camera is already in use",
            StreamErrorKind::Interrupted => "The camera request was interrupted",
            StreamErrorKind::Unknown => "The camera could not be started",
        }
    }

    /// What the user can do about it.
    pub fn remediation(&self) -> &'static str {
        match self {
            StreamErrorKind::Unsupported => {
                "Use a device with a camera and open the app over a secure (HTTPS) connection"
            }
            StreamErrorKind::PermissionDenied => {
                if cfg!(target_os = "macos") {
                    "Grant access in System Settings > Privacy & Security > Camera, then retry"
                } else {
                    "Allow camera access for this app in your browser or system settings, then retry"
                }
            }
            StreamErrorKind::DeviceNotFound => {
                "Connect a camera (or pick the other facing mode) and retry"
            }
            StreamErrorKind::DeviceBusy => {
                "Close other applications that are using the camera, then retry"
            }
            StreamErrorKind::Interrupted => "Retry to request the camera again",
            StreamErrorKind::Unknown => "Reload the page or restart the device, then retry",
        }
    }
}

impl fmt::Display for StreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.message(), self.remediation())
    }
}

impl std::error::Error for StreamErrorKind {}

/// Raw failure reported by a camera backend before classification.
///
/// `name` carries a platform error name when one exists (for example the
/// `NotAllowedError` family of media-device errors); `message` is free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFailure {
    pub name: Option<String>,
    pub message: String,
}

impl DeviceFailure {
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            name: None,
            message: message.into(),
        }
    }

    /// Map this failure into exactly one [`StreamErrorKind`].
    ///
    /// Known error names win; otherwise the message is matched against
    /// keyword groups in priority order. Anything left is `Unknown`.
    pub fn classify(&self) -> StreamErrorKind {
        if let Some(kind) = self.name.as_deref().and_then(classify_name) {
            return kind;
        }
        classify_message(&self.message)
    }
}

impl fmt::Display for DeviceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {}", name, self.message),
            None => f.write_str(&self.message),
        }
    }
}

fn classify_name(name: &str) -> Option<StreamErrorKind> {
    let kind = match name {
        "NotSupportedError" | "TypeError" => StreamErrorKind::Unsupported,
        "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
            StreamErrorKind::PermissionDenied
        }
        "NotFoundError"
        | "DevicesNotFoundError"
        | "OverconstrainedError"
        | "ConstraintNotSatisfiedError" => StreamErrorKind::DeviceNotFound,
        "NotReadableError" | "TrackStartError" => StreamErrorKind::DeviceBusy,
        "AbortError" => StreamErrorKind::Interrupted,
        _ => return None,
    };
    Some(kind)
}

const KEYWORDS: &[(StreamErrorKind, &[&str])] = &[
    (
        StreamErrorKind::PermissionDenied,
        &["permission", "denied", "authoriz", "not allowed"],
    ),
    (
        StreamErrorKind::DeviceBusy,
        &["busy", "in use", "already open", "locked", "not readable"],
    ),
    (
        StreamErrorKind::DeviceNotFound,
        &["not found", "no device", "no camera", "does not exist", "out of range"],
    ),
    (
        StreamErrorKind::Interrupted,
        &["interrupt", "abort", "cancel", "disconnect"],
    ),
    (
        StreamErrorKind::Unsupported,
        &["not supported", "unsupported", "not implemented"],
    ),
];

fn classify_message(message: &str) -> StreamErrorKind {
    let msg = message.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| msg.contains(w)))
        .map(|(kind, _)| *kind)
        .unwrap_or(StreamErrorKind::Unknown)
}
