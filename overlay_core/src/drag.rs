// Drag controller: Idle -> Dragging -> Idle. At most one session per page agent.
// Races (overlay removed or frozen mid-drag) degrade to no-ops.

use log::{debug, warn};

use crate::registry::OverlayRegistry;
use crate::renderer::Renderer;
use crate::types::{OverlayId, OverlayPatch, Position};

/// Pointer position in viewport pixels.
pub type PointerPos = (i32, i32);

/// Transient state of one in-progress drag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub overlay_id: OverlayId,
    pub pointer_start: PointerPos,
    pub origin_start: Position,
}

impl DragSession {
    /// Position the overlay should take for the given pointer.
    pub fn position_for(&self, pointer: PointerPos) -> Position {
        let dx = pointer.0.saturating_sub(self.pointer_start.0);
        let dy = pointer.1.saturating_sub(self.pointer_start.1);
        self.origin_start.offset(dx, dy)
    }
}

/// Why a pointer-down did not start a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragRejected {
    Busy,
    Locked,
    Unknown,
}

/// Finished drag. `position` is `None` when the overlay vanished mid-drag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragEnd {
    pub overlay_id: OverlayId,
    pub position: Option<Position>,
}

#[derive(Debug, Default)]
pub struct DragController {
    session: Option<DragSession>,
}

impl DragController {
    pub fn new() -> Self {
        DragController { session: None }
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    pub fn pointer_down<R: Renderer>(
        &mut self,
        registry: &OverlayRegistry<R>,
        overlay_id: &OverlayId,
        pointer: PointerPos,
    ) -> Result<(), DragRejected> {
        if self.session.is_some() {
            return Err(DragRejected::Busy);
        }
        let overlay = registry.get(overlay_id).ok_or(DragRejected::Unknown)?;
        if overlay.locked {
            return Err(DragRejected::Locked);
        }

        debug!("drag start on {} at {:?}", overlay_id, pointer);
        self.session = Some(DragSession {
            overlay_id: overlay_id.clone(),
            pointer_start: pointer,
            origin_start: overlay.position,
        });
        Ok(())
    }

    /// Apply the pointer delta. Returns the new position, or `None` when idle.
    pub fn pointer_move<R: Renderer>(
        &mut self,
        registry: &mut OverlayRegistry<R>,
        pointer: PointerPos,
    ) -> Option<Position> {
        let session = self.session.as_ref()?;
        let position = session.position_for(pointer);
        match registry.update(&session.overlay_id, &OverlayPatch::position(position)) {
            Ok(_) => Some(position),
            Err(err) => {
                warn!("drag move ignored: {}", err);
                None
            }
        }
    }

    /// Finish the session. Position is already applied by the moves.
    pub fn pointer_up<R: Renderer>(&mut self, registry: &OverlayRegistry<R>) -> Option<DragEnd> {
        let session = self.session.take()?;
        let position = registry.get(&session.overlay_id).map(|o| o.position);
        debug!("drag end on {} at {:?}", session.overlay_id, position);
        Some(DragEnd {
            overlay_id: session.overlay_id,
            position,
        })
    }

    /// Drop the session without notifying anyone.
    pub fn cancel(&mut self) -> Option<DragSession> {
        self.session.take()
    }

    /// Drop the session only if it targets `overlay_id`.
    pub fn cancel_for(&mut self, overlay_id: &OverlayId) -> bool {
        if self.session.as_ref().map(|s| &s.overlay_id) == Some(overlay_id) {
            self.session = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::testing::{sample_overlay, FakeRenderer};
    use proptest::prelude::*;

    fn registry_with(ids: &[&str]) -> OverlayRegistry<FakeRenderer> {
        let mut registry = OverlayRegistry::new(FakeRenderer::new());
        for id in ids {
            registry.create(sample_overlay(id)).unwrap();
        }
        registry
    }

    #[test]
    fn drag_math() {
        let mut registry = registry_with(&["A"]);
        let id = OverlayId::from("A");
        registry
            .update(&id, &OverlayPatch::position(Position::new(10, 20)))
            .unwrap();

        let mut drag = DragController::new();
        drag.pointer_down(&registry, &id, (100, 100)).unwrap();
        assert_eq!(drag.pointer_move(&mut registry, (130, 115)), Some(Position::new(40, 35)));
        assert_eq!(registry.get(&id).unwrap().position, Position::new(40, 35));
    }

    #[test]
    fn second_drag_is_rejected() {
        let mut registry = registry_with(&["A", "B"]);
        let a = OverlayId::from("A");
        let b = OverlayId::from("B");

        let mut drag = DragController::new();
        drag.pointer_down(&registry, &a, (0, 0)).unwrap();
        assert_eq!(drag.pointer_down(&registry, &b, (5, 5)), Err(DragRejected::Busy));
        assert_eq!(drag.session().unwrap().overlay_id, a);

        drag.pointer_move(&mut registry, (7, 3));
        assert_eq!(registry.get(&a).unwrap().position, Position::new(7, 3));
        assert_eq!(registry.get(&b).unwrap().position, Position::new(0, 0));
    }

    #[test]
    fn locked_overlay_stays_idle() {
        let mut registry = OverlayRegistry::new(FakeRenderer::new());
        let mut locked = sample_overlay("B");
        locked.locked = true;
        registry.create(locked).unwrap();

        let mut drag = DragController::new();
        let id = OverlayId::from("B");
        assert_eq!(drag.pointer_down(&registry, &id, (0, 0)), Err(DragRejected::Locked));
        assert!(!drag.is_dragging());
        assert_eq!(drag.pointer_move(&mut registry, (50, 50)), None);
        assert_eq!(registry.get(&id).unwrap().position, Position::new(0, 0));
    }

    #[test]
    fn unknown_overlay_is_rejected() {
        let registry = registry_with(&[]);
        let mut drag = DragController::new();
        assert_eq!(
            drag.pointer_down(&registry, &OverlayId::from("X"), (0, 0)),
            Err(DragRejected::Unknown)
        );
    }

    #[test]
    fn pointer_up_without_session_is_noop() {
        let registry = registry_with(&["A"]);
        let mut drag = DragController::new();
        assert_eq!(drag.pointer_up(&registry), None);
    }

    #[test]
    fn removed_mid_drag_finishes_quietly() {
        let mut registry = registry_with(&["A"]);
        let id = OverlayId::from("A");
        let mut drag = DragController::new();
        drag.pointer_down(&registry, &id, (0, 0)).unwrap();
        registry.remove(&id);

        assert_eq!(drag.pointer_move(&mut registry, (10, 10)), None);
        let end = drag.pointer_up(&registry).unwrap();
        assert_eq!(end.position, None);
        assert!(!drag.is_dragging());
    }

    #[test]
    fn cancel_for_only_matches_target() {
        let registry = registry_with(&["A"]);
        let mut drag = DragController::new();
        drag.pointer_down(&registry, &OverlayId::from("A"), (0, 0)).unwrap();
        assert!(!drag.cancel_for(&OverlayId::from("B")));
        assert!(drag.cancel_for(&OverlayId::from("A")));
        assert!(!drag.is_dragging());
    }

    proptest! {
        #[test]
        fn position_is_origin_plus_delta(
            sx in -2_000i32..2_000, sy in -2_000i32..2_000,
            ox in -2_000i32..2_000, oy in -2_000i32..2_000,
            px in -2_000i32..2_000, py in -2_000i32..2_000,
        ) {
            let session = DragSession {
                overlay_id: OverlayId::from("A"),
                pointer_start: (sx, sy),
                origin_start: Position::new(ox, oy),
            };
            prop_assert_eq!(
                session.position_for((px, py)),
                Position::new(ox + (px - sx), oy + (py - sy))
            );
        }
    }
}
