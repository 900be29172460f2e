//! Pointer and slider input for the overlay.
//!
//! A drag captures the pointer and the overlay position when it begins;
//! every update is computed against that snapshot, so deltas never
//! accumulate rounding drift across frames.

use serde::Serialize;

use crate::transform::OverlayTransform;

/// Pointer location in container pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointerPos {
    pub x: f32,
    pub y: f32,
}

impl PointerPos {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Size of the element the pointer moves over, in the same units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContainerSize {
    pub width: f32,
    pub height: f32,
}

impl ContainerSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    id: u64,
    start_pointer: PointerPos,
    start_x: f32,
    start_y: f32,
}

impl DragSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Overlay position when the drag began.
    pub fn start_position(&self) -> (f32, f32) {
        (self.start_x, self.start_y)
    }
}

/// Result of one drag update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DragUpdate {
    /// Pointer travel since the drag began, in percent of the container.
    pub dx: f32,
    pub dy: f32,
    /// Clamped overlay position to apply.
    pub position_x: f32,
    pub position_y: f32,
}

impl DragUpdate {
    pub fn apply(&self, transform: &mut OverlayTransform) {
        transform.set_position(self.position_x, self.position_y);
    }
}

/// Direct control changes that need no session state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "control", content = "value", rename_all = "snake_case")]
pub enum Adjustment {
    Position { x: f32, y: f32 },
    Scale(f32),
    Rotation(f32),
    Opacity(f32),
    Mirror(bool),
    ToggleMirror,
    Reset,
}

impl Adjustment {
    pub fn apply(self, transform: &mut OverlayTransform) {
        match self {
            Adjustment::Position { x, y } => transform.set_position(x, y),
            Adjustment::Scale(v) => transform.set_scale(v),
            Adjustment::Rotation(v) => transform.set_rotation(v),
            Adjustment::Opacity(v) => transform.set_opacity(v),
            Adjustment::Mirror(on) => transform.set_mirrored(on),
            Adjustment::ToggleMirror => transform.toggle_mirrored(),
            Adjustment::Reset => transform.reset(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InteractionError {
    #[error("a drag is already in progress")]
    DragInProgress,
    #[error("no drag is in progress")]
    NoActiveDrag,
    #[error("drag session {0} has already ended")]
    StaleDrag(u64),
    #[error("container has no usable size")]
    EmptyContainer,
}

/// Owns the (single) active drag session.
#[derive(Debug, Default)]
pub struct InteractionController {
    active: Option<DragSession>,
    next_id: u64,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_drag(&self) -> Option<&DragSession> {
        self.active.as_ref()
    }

    /// Start dragging. Rejected while another drag is active.
    pub fn begin_drag(
        &mut self,
        transform: &OverlayTransform,
        pointer: PointerPos,
    ) -> Result<DragSession, InteractionError> {
        if self.active.is_some() {
            return Err(InteractionError::DragInProgress);
        }
        self.next_id += 1;
        let session = DragSession {
            id: self.next_id,
            start_pointer: pointer,
            start_x: transform.position_x(),
            start_y: transform.position_y(),
        };
        self.active = Some(session);
        Ok(session)
    }

    /// Compute the overlay position for `pointer`.
    ///
    /// `container` is read on every update so a resize mid-drag is handled.
    pub fn update_drag(
        &self,
        session: &DragSession,
        pointer: PointerPos,
        container: ContainerSize,
    ) -> Result<DragUpdate, InteractionError> {
        self.check_active(session)?;
        if !container.is_usable() {
            return Err(InteractionError::EmptyContainer);
        }

        let dx = (pointer.x - session.start_pointer.x) / container.width * 100.0;
        let dy = (pointer.y - session.start_pointer.y) / container.height * 100.0;
        let position_x = finite_or(session.start_x + dx, session.start_x).clamp(0.0, 100.0);
        let position_y = finite_or(session.start_y + dy, session.start_y).clamp(0.0, 100.0);

        Ok(DragUpdate {
            dx,
            dy,
            position_x,
            position_y,
        })
    }

    pub fn end_drag(&mut self, session: &DragSession) -> Result<(), InteractionError> {
        self.check_active(session)?;
        self.active = None;
        Ok(())
    }

    /// Drop any active drag without validating it (teardown, stream loss).
    pub fn cancel(&mut self) -> Option<DragSession> {
        self.active.take()
    }

    fn check_active(&self, session: &DragSession) -> Result<(), InteractionError> {
        match &self.active {
            Some(active) if active.id == session.id => Ok(()),
            Some(_) => Err(InteractionError::StaleDrag(session.id)),
            None => Err(InteractionError::NoActiveDrag),
        }
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTAINER: ContainerSize = ContainerSize {
        width: 800.0,
        height: 600.0,
    };

    #[test]
    fn test_drag_relative_delta() {
        let mut controller = InteractionController::new();
        let mut transform = OverlayTransform::default();

        let session = controller
            .begin_drag(&transform, PointerPos::new(400.0, 300.0))
            .unwrap();
        // +10% of the container width
        let update = controller
            .update_drag(&session, PointerPos::new(480.0, 300.0), CONTAINER)
            .unwrap();
        update.apply(&mut transform);

        assert_eq!(update.dx, 10.0);
        assert_eq!(update.dy, 0.0);
        assert_eq!((transform.position_x(), transform.position_y()), (60.0, 50.0));
    }

    #[test]
    fn test_updates_do_not_accumulate() {
        let mut controller = InteractionController::new();
        let mut transform = OverlayTransform::default();
        let session = controller
            .begin_drag(&transform, PointerPos::new(0.0, 0.0))
            .unwrap();

        for _ in 0..10 {
            let update = controller
                .update_drag(&session, PointerPos::new(80.0, 60.0), CONTAINER)
                .unwrap();
            update.apply(&mut transform);
        }
        assert_eq!((transform.position_x(), transform.position_y()), (60.0, 60.0));
    }

    #[test]
    fn test_new_drag_ignores_previous_sessions() {
        let mut controller = InteractionController::new();
        let mut transform = OverlayTransform::default();

        let first = controller.begin_drag(&transform, PointerPos::new(0.0, 0.0)).unwrap();
        controller
            .update_drag(&first, PointerPos::new(-400.0, 0.0), CONTAINER)
            .unwrap()
            .apply(&mut transform);
        controller.end_drag(&first).unwrap();
        assert_eq!(transform.position_x(), 0.0);

        transform.set_position(50.0, 50.0);
        let second = controller
            .begin_drag(&transform, PointerPos::new(100.0, 100.0))
            .unwrap();
        let update = controller
            .update_drag(&second, PointerPos::new(180.0, 100.0), CONTAINER)
            .unwrap();
        assert_eq!((update.position_x, update.position_y), (60.0, 50.0));
    }

    #[test]
    fn test_drag_clamps_to_bounds() {
        let mut controller = InteractionController::new();
        let transform = OverlayTransform::default();
        let session = controller.begin_drag(&transform, PointerPos::new(0.0, 0.0)).unwrap();

        let update = controller
            .update_drag(&session, PointerPos::new(2000.0, -2000.0), CONTAINER)
            .unwrap();
        assert_eq!((update.position_x, update.position_y), (100.0, 0.0));
    }

    #[test]
    fn test_second_drag_is_rejected() {
        let mut controller = InteractionController::new();
        let transform = OverlayTransform::default();
        let session = controller.begin_drag(&transform, PointerPos::new(0.0, 0.0)).unwrap();

        assert_eq!(
            controller.begin_drag(&transform, PointerPos::new(5.0, 5.0)),
            Err(InteractionError::DragInProgress)
        );

        controller.end_drag(&session).unwrap();
        assert!(controller.begin_drag(&transform, PointerPos::new(5.0, 5.0)).is_ok());
    }

    #[test]
    fn test_ended_session_is_stale() {
        let mut controller = InteractionController::new();
        let transform = OverlayTransform::default();
        let old = controller.begin_drag(&transform, PointerPos::new(0.0, 0.0)).unwrap();
        controller.end_drag(&old).unwrap();

        assert_eq!(
            controller.update_drag(&old, PointerPos::new(1.0, 1.0), CONTAINER),
            Err(InteractionError::NoActiveDrag)
        );

        let _new = controller.begin_drag(&transform, PointerPos::new(0.0, 0.0)).unwrap();
        assert_eq!(
            controller.update_drag(&old, PointerPos::new(1.0, 1.0), CONTAINER),
            Err(InteractionError::StaleDrag(old.id()))
        );
        assert_eq!(controller.end_drag(&old), Err(InteractionError::StaleDrag(old.id())));
    }

    #[test]
    fn test_zero_container_is_rejected() {
        let mut controller = InteractionController::new();
        let transform = OverlayTransform::default();
        let session = controller.begin_drag(&transform, PointerPos::new(0.0, 0.0)).unwrap();
        assert_eq!(
            controller.update_drag(&session, PointerPos::new(1.0, 1.0), ContainerSize::new(0.0, 10.0)),
            Err(InteractionError::EmptyContainer)
        );
    }

    #[test]
    fn test_adjustments_clamp() {
        let mut transform = OverlayTransform::default();
        Adjustment::Scale(1000.0).apply(&mut transform);
        Adjustment::Rotation(200.0).apply(&mut transform);
        Adjustment::Opacity(-5.0).apply(&mut transform);
        Adjustment::ToggleMirror.apply(&mut transform);
        assert_eq!(transform.scale_percent(), 300.0);
        assert_eq!(transform.rotation_degrees(), -160.0);
        assert_eq!(transform.opacity_percent(), 0.0);
        assert!(transform.mirrored());

        Adjustment::Reset.apply(&mut transform);
        assert_eq!(transform, OverlayTransform::default());
    }
}
