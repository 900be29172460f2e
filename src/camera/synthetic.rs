//! Test-pattern camera backend.
//!
//! Produces deterministic gradient frames without touching hardware. Used by
//! the `test-pattern` CLI source and throughout the test suite, so it also
//! keeps count of how many streams are open at once and can be told to fail
//! the next requests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::backend::{CameraBackend, VideoStream};
use super::error::DeviceFailure;
use super::types::{CameraInfo, FacingMode, Frame, FrameFormat, Resolution, StreamRequest};

/// Open/close counters shared between a backend and its streams.
#[derive(Debug, Default)]
pub struct StreamStats {
    open: AtomicUsize,
    peak: AtomicUsize,
    opened_total: AtomicUsize,
}

impl StreamStats {
    /// Streams currently open.
    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Highest number of streams that were ever open at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Streams opened over the backend's lifetime.
    pub fn opened_total(&self) -> usize {
        self.opened_total.load(Ordering::SeqCst)
    }

    fn record_open(&self) {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.opened_total.fetch_add(1, Ordering::SeqCst);
    }

    fn record_close(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Camera backend that renders a moving gradient.
#[derive(Debug, Clone, Default)]
pub struct TestPatternBackend {
    /// When set, streams ignore the resolution hint and deliver this size.
    native: Option<Resolution>,
    /// Number of `latest_frame` calls that return nothing after opening.
    warmup_frames: u32,
    failures: Arc<Mutex<VecDeque<DeviceFailure>>>,
    stats: Arc<StreamStats>,
}

impl TestPatternBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `resolution` regardless of what was requested.
    pub fn with_native_resolution(mut self, resolution: Resolution) -> Self {
        self.native = Some(resolution);
        self
    }

    /// Make new streams report "no frame yet" for the first `frames` polls.
    pub fn with_warmup(mut self, frames: u32) -> Self {
        self.warmup_frames = frames;
        self
    }

    /// Queue a failure for the next `open` call.
    pub fn fail_next(&self, failure: DeviceFailure) {
        if let Ok(mut queue) = self.failures.lock() {
            queue.push_back(failure);
        }
    }

    pub fn stats(&self) -> Arc<StreamStats> {
        Arc::clone(&self.stats)
    }
}

impl CameraBackend for TestPatternBackend {
    type Stream = TestPatternStream;

    fn name(&self) -> &str {
        "test-pattern"
    }

    fn list_devices(&self) -> Result<Vec<CameraInfo>, DeviceFailure> {
        Ok(vec![CameraInfo {
            index: 0,
            name: "Test Pattern".to_string(),
            description: "Synthetic gradient source".to_string(),
        }])
    }

    fn open(
        &self,
        request: StreamRequest,
    ) -> impl Future<Output = Result<Self::Stream, DeviceFailure>> + Send {
        let failure = self.failures.lock().ok().and_then(|mut q| q.pop_front());
        let stats = Arc::clone(&self.stats);
        let resolution = self.native.unwrap_or(request.resolution_hint);
        let warmup = self.warmup_frames;

        async move {
            // Permission prompts and device negotiation happen off-tick.
            tokio::task::yield_now().await;

            if let Some(failure) = failure {
                return Err(failure);
            }
            if resolution.is_empty() {
                return Err(DeviceFailure::named(
                    "OverconstrainedError",
                    format!("cannot satisfy resolution {}", resolution),
                ));
            }

            stats.record_open();
            Ok(TestPatternStream {
                resolution,
                facing: request.facing,
                frame_index: 0,
                warmup_remaining: warmup,
                closed: false,
                stats,
            })
        }
    }
}

/// Stream handed out by [`TestPatternBackend`].
#[derive(Debug)]
pub struct TestPatternStream {
    resolution: Resolution,
    facing: FacingMode,
    frame_index: u64,
    warmup_remaining: u32,
    closed: bool,
    stats: Arc<StreamStats>,
}

impl TestPatternStream {
    fn render(&self) -> Frame {
        let Resolution { width, height } = self.resolution;
        let (w, h) = (width as usize, height as usize);
        let blue = match self.facing {
            FacingMode::User => 200u8,
            FacingMode::Environment => 60u8,
        };
        let bar = (self.frame_index as usize * 8) % w.max(1);

        let mut data = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            let g = (y * 255 / h.max(1)) as u8;
            for x in 0..w {
                let r = (x * 255 / w.max(1)) as u8;
                if x == bar {
                    data.extend_from_slice(&[255, 255, 255]);
                } else {
                    data.extend_from_slice(&[r, g, blue]);
                }
            }
        }

        Frame {
            data,
            width,
            height,
            format: FrameFormat::Rgb,
            timestamp: Instant::now(),
        }
    }
}

impl VideoStream for TestPatternStream {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        if self.closed {
            return None;
        }
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            return None;
        }
        let frame = self.render();
        self.frame_index += 1;
        Some(frame)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stats.record_close();
        }
    }
}

impl Drop for TestPatternStream {
    fn drop(&mut self) {
        self.close();
    }
}
