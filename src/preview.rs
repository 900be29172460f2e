//! Timer-driven preview: drives a session's render loop at a fixed rate
//! and captures snapshots along the way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::MissedTickBehavior;

use crate::camera::CameraBackend;
use crate::render::TickOutcome;
use crate::session::{Session, SessionError};
use crate::snapshot::{Delivery, SnapshotSink};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewOptions {
    pub fps: u32,
    /// Stop after this many drawn frames.
    pub max_frames: Option<u64>,
    /// Capture every N drawn frames.
    pub capture_every: Option<u64>,
    /// Give up if the stream produces nothing drawable for this long.
    pub ready_timeout: Duration,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            fps: 30,
            max_frames: None,
            capture_every: None,
            ready_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreviewReport {
    pub ticks: u64,
    pub drawn: u64,
    pub skipped: u64,
    pub deliveries: Vec<Delivery>,
    /// True when the run ended because `stop` was raised.
    pub interrupted: bool,
}

/// Run the preview until `stop` is raised or `max_frames` are drawn.
///
/// The render loop is started on entry and always stopped on exit.
pub async fn run_preview<B: CameraBackend>(
    session: &mut Session<B>,
    options: PreviewOptions,
    stop: &AtomicBool,
    sink: &mut dyn SnapshotSink,
) -> Result<PreviewReport, SessionError> {
    session.start_preview()?;
    let result = drive(session, options, stop, sink).await;
    session.stop_preview();
    result
}

async fn drive<B: CameraBackend>(
    session: &mut Session<B>,
    options: PreviewOptions,
    stop: &AtomicBool,
    sink: &mut dyn SnapshotSink,
) -> Result<PreviewReport, SessionError> {
    let period = Duration::from_secs_f64(1.0 / f64::from(options.fps.max(1)));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut report = PreviewReport::default();
    let mut last_drawn = Instant::now();

    loop {
        interval.tick().await;
        if stop.load(Ordering::SeqCst) {
            log::info!("Preview interrupted after {} frames", report.drawn);
            report.interrupted = true;
            break;
        }

        let Some(request) = session.next_frame_request() else {
            // Loop was stopped underneath us (stream lost)
            break;
        };
        let Some(outcome) = session.on_animation_frame(request) else {
            continue;
        };
        report.ticks += 1;

        match outcome {
            TickOutcome::Drawn => {
                report.drawn += 1;
                last_drawn = Instant::now();
            }
            TickOutcome::Skipped(reason) => {
                report.skipped += 1;
                if last_drawn.elapsed() >= options.ready_timeout {
                    log::warn!(
                        "No drawable frame for {:?} ({:?}), giving up",
                        options.ready_timeout,
                        reason
                    );
                    return Err(SessionError::NothingRendered);
                }
                continue;
            }
        }

        if let Some(every) = options.capture_every {
            if every > 0 && report.drawn % every == 0 {
                report.deliveries.push(session.capture_to(sink)?);
            }
        }
        if let Some(max) = options.max_frames {
            if report.drawn >= max {
                break;
            }
        }
    }

    Ok(report)
}

/// Install a Ctrl+C handler that raises the returned flag.
///
/// This should be called once at program startup.
pub fn setup_ctrlc_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
        eprintln!("\nReceived Ctrl+C, shutting down...");
    })?;
    Ok(flag)
}
