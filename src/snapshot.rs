//! Snapshot encoding and delivery.
//!
//! A [`Snapshot`] is a PNG of one finished composite. Sinks decide where it
//! goes: a file in a download directory, a callback, or a review slot that
//! holds it until the user accepts or discards it.

use std::fs::OpenOptions;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use image::{ImageFormat, RgbaImage};
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] image::ImageError),
    #[error("cannot snapshot an empty surface")]
    Empty,
    #[error("failed to write snapshot '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no snapshot is waiting for review")]
    NothingPending,
}

/// PNG-encoded composite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    #[serde(skip)]
    png: Vec<u8>,
    width: u32,
    height: u32,
    captured_at_ms: u64,
}

impl Snapshot {
    pub fn encode(image: &RgbaImage) -> Result<Self, SnapshotError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(SnapshotError::Empty);
        }
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png)?;
        Ok(Self {
            png: out.into_inner(),
            width: image.width(),
            height: image.height(),
            captured_at_ms: epoch_millis(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Capture time in milliseconds since the Unix epoch.
    pub fn captured_at_ms(&self) -> u64 {
        self.captured_at_ms
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn into_png(self) -> Vec<u8> {
        self.png
    }

    /// `<prefix>-<epoch-ms>.png`
    pub fn file_name(&self, prefix: &str) -> String {
        format!("{}-{}.png", prefix, self.captured_at_ms)
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }

    /// SHA-256 of the PNG bytes, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.png);
        hex::encode(hasher.finalize())
    }

    /// Decode back to pixels.
    pub fn decode(&self) -> Result<RgbaImage, SnapshotError> {
        let image = image::load_from_memory_with_format(&self.png, ImageFormat::Png)?;
        Ok(image.to_rgba8())
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// What a sink did with a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "delivery", content = "path", rename_all = "snake_case")]
pub enum Delivery {
    Saved(PathBuf),
    Handed,
    PendingReview,
}

pub trait SnapshotSink {
    fn deliver(&mut self, snapshot: Snapshot) -> Result<Delivery, SnapshotError>;
}

/// Writes `<prefix>-<epoch-ms>.png` into a directory.
#[derive(Debug, Clone)]
pub struct DownloadSink {
    dir: PathBuf,
    prefix: String,
}

impl DownloadSink {
    pub const DEFAULT_PREFIX: &'static str = "ar-capture";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: Self::DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Candidate paths for `snapshot`, in order: the plain name, then
    /// `-1`, `-2`, ... suffixes for same-millisecond captures.
    fn candidate_path(&self, snapshot: &Snapshot, attempt: u32) -> PathBuf {
        if attempt == 0 {
            self.dir.join(snapshot.file_name(&self.prefix))
        } else {
            self.dir.join(format!(
                "{}-{}-{}.png",
                self.prefix, snapshot.captured_at_ms, attempt
            ))
        }
    }

    /// Create the first free candidate and write the PNG into it. Creation
    /// is exclusive, so two writers never share a file.
    fn write_new(&self, snapshot: &Snapshot) -> Result<PathBuf, SnapshotError> {
        let mut attempt = 0u32;
        loop {
            let path = self.candidate_path(snapshot, attempt);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(snapshot.png_bytes())
                        .map_err(|source| SnapshotError::Io {
                            path: path.clone(),
                            source,
                        })?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                }
                Err(source) => return Err(SnapshotError::Io { path, source }),
            }
        }
    }
}

impl SnapshotSink for DownloadSink {
    fn deliver(&mut self, snapshot: Snapshot) -> Result<Delivery, SnapshotError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.write_new(&snapshot)?;
        log::info!(
            "Saved {}x{} snapshot to {}",
            snapshot.width(),
            snapshot.height(),
            path.display()
        );
        Ok(Delivery::Saved(path))
    }
}

/// Hands every snapshot to a closure.
pub struct CallbackSink<F> {
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: FnMut(Snapshot),
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> SnapshotSink for CallbackSink<F>
where
    F: FnMut(Snapshot),
{
    fn deliver(&mut self, snapshot: Snapshot) -> Result<Delivery, SnapshotError> {
        (self.callback)(snapshot);
        Ok(Delivery::Handed)
    }
}

/// Holds the latest snapshot until it is accepted or discarded. A new
/// snapshot replaces one still pending.
#[derive(Debug, Default)]
pub struct ReviewSink {
    pending: Option<Snapshot>,
}

impl ReviewSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&Snapshot> {
        self.pending.as_ref()
    }

    /// Forward the pending snapshot to `next`.
    pub fn accept(&mut self, next: &mut dyn SnapshotSink) -> Result<Delivery, SnapshotError> {
        let snapshot = self.pending.take().ok_or(SnapshotError::NothingPending)?;
        next.deliver(snapshot)
    }

    pub fn discard(&mut self) -> Option<Snapshot> {
        self.pending.take()
    }
}

impl SnapshotSink for ReviewSink {
    fn deliver(&mut self, snapshot: Snapshot) -> Result<Delivery, SnapshotError> {
        if self.pending.is_some() {
            log::debug!("Replacing snapshot awaiting review");
        }
        self.pending = Some(snapshot);
        Ok(Delivery::PendingReview)
    }
}
