//! Session state machine.
//!
//! A [`Session`] ties the stream manager, the transform, the overlay and the
//! render loop together and gates every operation on the stream status:
//!
//! ```text
//! Idle ──start──▶ RequestingPermission ──ok──▶ Streaming ──stop──▶ Stopped
//!                        ▲      │                 │                  │
//!                        │      └──err──▶ Error   └─switch facing─┐  │
//!                        └──────── retry ─┘ ◀─────────────────────┘◀─┘ restart
//! ```
//!
//! Only `Streaming` allows the preview loop, capture and interaction.

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};

use serde::Serialize;

use crate::camera::{CameraBackend, FacingMode, Resolution, StreamErrorKind, StreamHandle, StreamManager};
use crate::interaction::{
    Adjustment, ContainerSize, DragSession, DragUpdate, InteractionController, InteractionError,
    PointerPos,
};
use crate::overlay::{self, OverlayError, OverlayImage, OverlaySource};
use crate::profile::EngineProfile;
use crate::render::{
    composite, CompositeLayers, CompositeReport, FrameRequest, LoopState, LoopStats,
    RasterSurface, RenderLoop, SkipReason, TickOutcome,
};
use crate::snapshot::{Delivery, Snapshot, SnapshotError, SnapshotSink};
use crate::transform::{OverlayTransform, TransformLimits};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    RequestingPermission,
    Streaming,
    Error,
    Stopped,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::RequestingPermission => "requesting_permission",
            SessionStatus::Streaming => "streaming",
            SessionStatus::Error => "error",
            SessionStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable stream state. `handle` is present iff `status` is
/// `Streaming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamSession {
    status: SessionStatus,
    facing: FacingMode,
    error_kind: Option<StreamErrorKind>,
    handle: Option<StreamHandle>,
}

impl StreamSession {
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn error_kind(&self) -> Option<StreamErrorKind> {
        self.error_kind
    }

    pub fn handle(&self) -> Option<StreamHandle> {
        self.handle
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    StatusChanged {
        from: SessionStatus,
        to: SessionStatus,
    },
    StreamAcquired {
        facing: FacingMode,
        resolution: Resolution,
    },
    StreamReleased,
    Failed {
        kind: StreamErrorKind,
    },
    PreviewStarted,
    PreviewStopped,
    Captured {
        width: u32,
        height: u32,
        bytes: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot {operation} while {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },
    #[error("{0}")]
    Stream(#[from] StreamErrorKind),
    #[error("no frame has been composited yet")]
    NothingRendered,
    #[error(transparent)]
    Interaction(#[from] InteractionError),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl SessionError {
    /// True when the caller used the session in a state that forbids the
    /// operation, as opposed to a device or I/O failure.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, SessionError::InvalidState { .. })
    }
}

/// The part of a session the render loop draws from.
pub struct SessionCore<B: CameraBackend> {
    manager: StreamManager<B>,
    stream: StreamSession,
    surface: RasterSurface,
    transform: OverlayTransform,
    overlay: Option<OverlayImage>,
    overlay_visible: bool,
    grid_enabled: bool,
    profile: EngineProfile,
    last_report: Option<CompositeReport>,
}

impl<B: CameraBackend> SessionCore<B> {
    /// One render tick: video, grid, overlay.
    ///
    /// The transform is copied before drawing, so the composite always
    /// uses a single consistent value.
    pub fn composite_tick(&mut self) -> TickOutcome {
        if self.stream.status != SessionStatus::Streaming {
            return TickOutcome::Skipped(SkipReason::NotStreaming);
        }
        let frame = match self.manager.latest_frame() {
            Some(frame) if frame.is_decodable() => frame,
            _ => {
                log::debug!("Skipping tick: no decodable frame yet");
                return TickOutcome::Skipped(SkipReason::FrameNotReady);
            }
        };

        let layers = CompositeLayers {
            transform: self.transform,
            overlay: if self.overlay_visible {
                self.overlay.as_ref()
            } else {
                None
            },
            grid: if self.grid_enabled {
                Some(self.profile.grid)
            } else {
                None
            },
            base_fraction: self.profile.base_fraction,
        };
        self.last_report = Some(composite(&mut self.surface, &frame, &layers));
        TickOutcome::Drawn
    }
}

pub struct Session<B: CameraBackend> {
    core: SessionCore<B>,
    render_loop: RenderLoop<SessionCore<B>>,
    interaction: InteractionController,
    subscribers: Vec<Sender<SessionEvent>>,
}

impl<B: CameraBackend> Session<B> {
    pub fn new(backend: B, profile: EngineProfile) -> Self {
        Self {
            core: SessionCore {
                manager: StreamManager::new(backend).with_fps(profile.fps),
                stream: StreamSession::default(),
                surface: RasterSurface::new(),
                transform: OverlayTransform::new(TransformLimits::from(&profile)),
                overlay: None,
                overlay_visible: true,
                grid_enabled: false,
                profile,
                last_report: None,
            },
            render_loop: RenderLoop::new(),
            interaction: InteractionController::new(),
            subscribers: Vec::new(),
        }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn status(&self) -> SessionStatus {
        self.core.stream.status
    }

    pub fn stream_session(&self) -> &StreamSession {
        &self.core.stream
    }

    pub fn profile(&self) -> &EngineProfile {
        &self.core.profile
    }

    pub fn transform(&self) -> &OverlayTransform {
        &self.core.transform
    }

    pub fn surface(&self) -> &RasterSurface {
        &self.core.surface
    }

    pub fn backend(&self) -> &B {
        self.core.manager.backend()
    }

    pub fn last_report(&self) -> Option<CompositeReport> {
        self.core.last_report
    }

    pub fn loop_state(&self) -> LoopState {
        self.render_loop.state()
    }

    pub fn render_stats(&self) -> LoopStats {
        self.render_loop.stats()
    }

    // --- stream lifecycle ---

    /// Acquire a stream. Allowed from `Idle`, `Stopped` and `Error`.
    pub async fn start(&mut self, facing: FacingMode) -> Result<StreamHandle, SessionError> {
        match self.status() {
            SessionStatus::Idle | SessionStatus::Stopped | SessionStatus::Error => {}
            status => return Err(self.rejected("start the stream", status)),
        }
        self.acquire(facing).await
    }

    /// Re-request the stream after a failure, with the same facing mode.
    pub async fn retry(&mut self) -> Result<StreamHandle, SessionError> {
        self.require(SessionStatus::Error, "retry")?;
        let facing = self.core.stream.facing;
        self.acquire(facing).await
    }

    /// Release the live stream and acquire one for `facing`.
    ///
    /// A running preview is resumed on the new stream.
    pub async fn switch_facing(&mut self, facing: FacingMode) -> Result<StreamHandle, SessionError> {
        self.require(SessionStatus::Streaming, "switch camera")?;
        let resume_preview = self.stop_preview();
        self.interaction.cancel();
        self.release_handle();

        let handle = self.acquire(facing).await?;
        if resume_preview {
            self.start_preview()?;
        }
        Ok(handle)
    }

    pub async fn toggle_facing(&mut self) -> Result<StreamHandle, SessionError> {
        let facing = self.core.stream.facing.toggled();
        self.switch_facing(facing).await
    }

    /// `Streaming -> Stopped`.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        self.require(SessionStatus::Streaming, "stop")?;
        self.stop_preview();
        self.interaction.cancel();
        self.release_handle();
        self.set_status(SessionStatus::Stopped);
        Ok(())
    }

    /// Release everything, whatever the state. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.stop_preview();
        self.interaction.cancel();
        self.release_handle();
        if matches!(
            self.status(),
            SessionStatus::Streaming | SessionStatus::RequestingPermission
        ) {
            self.set_status(SessionStatus::Stopped);
        }
    }

    async fn acquire(&mut self, facing: FacingMode) -> Result<StreamHandle, SessionError> {
        self.core.stream.facing = facing;
        self.core.stream.error_kind = None;
        self.set_status(SessionStatus::RequestingPermission);

        let hint = self.core.profile.resolution_hint;
        let mut pending = PendingRequest {
            session: self,
            settled: false,
        };
        let result = pending
            .session
            .core
            .manager
            .request_stream(facing, hint)
            .await;
        pending.settled = true;

        let this = &mut *pending.session;
        match result {
            Ok(handle) => {
                // A new stream never inherits an old composite
                this.core.surface = RasterSurface::new();
                this.core.last_report = None;
                this.core.stream.handle = Some(handle);
                this.set_status(SessionStatus::Streaming);
                this.publish(SessionEvent::StreamAcquired {
                    facing,
                    resolution: handle.resolution(),
                });
                Ok(handle)
            }
            Err(kind) => {
                this.enter_error(kind);
                Err(SessionError::Stream(kind))
            }
        }
    }

    fn enter_error(&mut self, kind: StreamErrorKind) {
        self.stop_preview();
        self.interaction.cancel();
        self.release_handle();
        self.core.stream.error_kind = Some(kind);
        self.set_status(SessionStatus::Error);
        self.publish(SessionEvent::Failed { kind });
    }

    fn release_handle(&mut self) {
        if let Some(handle) = self.core.stream.handle.take() {
            self.core.manager.release_stream(&handle);
            self.publish(SessionEvent::StreamReleased);
        }
        // Covers a stream opened but never recorded
        self.core.manager.release_active();
    }

    // --- preview loop ---

    /// Start the render loop. Returns `false` if it was already running.
    pub fn start_preview(&mut self) -> Result<bool, SessionError> {
        self.require(SessionStatus::Streaming, "start the preview")?;
        let started = self
            .render_loop
            .start(Box::new(|core: &mut SessionCore<B>| core.composite_tick()));
        if started {
            log::info!("Preview started");
            self.publish(SessionEvent::PreviewStarted);
        }
        Ok(started)
    }

    /// Stop the render loop. Returns `false` if it was not running.
    pub fn stop_preview(&mut self) -> bool {
        let stopped = self.render_loop.stop();
        if stopped {
            log::info!("Preview stopped");
            self.publish(SessionEvent::PreviewStopped);
        }
        stopped
    }

    /// Ask for the next frame callback while the preview runs.
    pub fn next_frame_request(&mut self) -> Option<FrameRequest> {
        self.render_loop.next_request()
    }

    /// Deliver a frame callback. Stale requests return `None`.
    pub fn on_animation_frame(&mut self, request: FrameRequest) -> Option<TickOutcome> {
        self.render_loop.fire(request, &mut self.core)
    }

    /// Request and deliver one frame callback.
    pub fn animation_frame(&mut self) -> Option<TickOutcome> {
        self.render_loop.pump(&mut self.core)
    }

    // --- capture ---

    /// Encode the last completed composite.
    pub fn capture(&mut self) -> Result<Snapshot, SessionError> {
        self.require(SessionStatus::Streaming, "capture")?;
        if !self.core.surface.has_composite() {
            return Err(SessionError::NothingRendered);
        }
        let snapshot = Snapshot::encode(self.core.surface.image())?;
        log::info!("Captured {}x{} composite", snapshot.width(), snapshot.height());
        self.publish(SessionEvent::Captured {
            width: snapshot.width(),
            height: snapshot.height(),
            bytes: snapshot.png_bytes().len(),
        });
        Ok(snapshot)
    }

    /// Composite one fresh frame and capture it, without the preview loop.
    pub fn capture_once(&mut self) -> Result<Snapshot, SessionError> {
        self.require(SessionStatus::Streaming, "capture")?;
        if let TickOutcome::Skipped(reason) = self.core.composite_tick() {
            log::debug!("Fresh composite skipped ({:?}), using the last one", reason);
        }
        self.capture()
    }

    /// Capture and hand the snapshot to `sink`.
    pub fn capture_to(&mut self, sink: &mut dyn SnapshotSink) -> Result<Delivery, SessionError> {
        let snapshot = self.capture()?;
        Ok(sink.deliver(snapshot)?)
    }

    // --- overlay ---

    /// Decode `source` off the render path and install it.
    pub async fn load_overlay(&mut self, source: OverlaySource) -> Result<(), SessionError> {
        let image = overlay::load_overlay(source).await?;
        self.set_overlay(image);
        Ok(())
    }

    pub fn set_overlay(&mut self, image: OverlayImage) {
        log::info!("Overlay set ({}x{})", image.width(), image.height());
        self.core.overlay = Some(image);
    }

    pub fn clear_overlay(&mut self) -> Option<OverlayImage> {
        self.core.overlay.take()
    }

    pub fn overlay(&self) -> Option<&OverlayImage> {
        self.core.overlay.as_ref()
    }

    pub fn set_overlay_visible(&mut self, visible: bool) {
        self.core.overlay_visible = visible;
    }

    pub fn overlay_visible(&self) -> bool {
        self.core.overlay_visible
    }

    pub fn set_grid_enabled(&mut self, enabled: bool) {
        self.core.grid_enabled = enabled;
    }

    pub fn grid_enabled(&self) -> bool {
        self.core.grid_enabled
    }

    // --- interaction ---

    pub fn begin_drag(&mut self, pointer: PointerPos) -> Result<DragSession, SessionError> {
        self.require(SessionStatus::Streaming, "drag the overlay")?;
        Ok(self.interaction.begin_drag(&self.core.transform, pointer)?)
    }

    /// Move the overlay for `pointer` and return the applied update.
    pub fn update_drag(
        &mut self,
        session: &DragSession,
        pointer: PointerPos,
        container: ContainerSize,
    ) -> Result<DragUpdate, SessionError> {
        self.require(SessionStatus::Streaming, "drag the overlay")?;
        let update = self.interaction.update_drag(session, pointer, container)?;
        update.apply(&mut self.core.transform);
        Ok(update)
    }

    pub fn end_drag(&mut self, session: &DragSession) -> Result<(), SessionError> {
        Ok(self.interaction.end_drag(session)?)
    }

    pub fn adjust(&mut self, adjustment: Adjustment) -> Result<(), SessionError> {
        self.require(SessionStatus::Streaming, "adjust the overlay")?;
        adjustment.apply(&mut self.core.transform);
        Ok(())
    }

    pub fn reset_transform(&mut self) -> Result<(), SessionError> {
        self.adjust(Adjustment::Reset)
    }

    // --- helpers ---

    fn require(&self, status: SessionStatus, operation: &'static str) -> Result<(), SessionError> {
        if self.status() == status {
            Ok(())
        } else {
            Err(self.rejected(operation, self.status()))
        }
    }

    fn rejected(&self, operation: &'static str, status: SessionStatus) -> SessionError {
        log::warn!("Rejected '{}' while {}", operation, status);
        SessionError::InvalidState { operation, status }
    }

    fn set_status(&mut self, to: SessionStatus) {
        let from = self.core.stream.status;
        if from == to {
            return;
        }
        self.core.stream.status = to;
        log::info!("Session {} -> {}", from, to);
        self.publish(SessionEvent::StatusChanged { from, to });
    }

    fn publish(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// An in-flight stream request. If the request future is dropped before
/// the backend answers, the session ends up in `Error` with
/// [`StreamErrorKind::Interrupted`] so it can be retried.
struct PendingRequest<'a, B: CameraBackend> {
    session: &'a mut Session<B>,
    settled: bool,
}

impl<B: CameraBackend> Drop for PendingRequest<'_, B> {
    fn drop(&mut self) {
        if !self.settled {
            log::warn!("Camera request was dropped before it completed");
            self.session.enter_error(StreamErrorKind::Interrupted);
        }
    }
}

impl<B: CameraBackend> Drop for Session<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
