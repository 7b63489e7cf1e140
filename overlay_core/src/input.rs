// Abstract input events. The DOM shell translates browser events into these,
// tests feed them directly.

use serde::{Deserialize, Serialize};

use crate::menu::MenuAction;
use crate::shortcuts::KeyChord;
use crate::types::OverlayId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    /// Pointer pressed on an overlay's surface.
    PointerDown { overlay_id: OverlayId, x: i32, y: i32 },
    PointerMove { x: i32, y: i32 },
    PointerUp { x: i32, y: i32 },
    /// Pointer lost without a release: `pointercancel`, or the window lost focus.
    PointerCancel,
    /// `editable` is set when focus is in an input, textarea or contenteditable.
    KeyDown {
        chord: KeyChord,
        #[serde(default)]
        editable: bool,
    },
    MenuToggle { overlay_id: OverlayId },
    MenuAction {
        overlay_id: OverlayId,
        action: MenuAction,
    },
    /// Click that did not land inside any menu.
    DocumentClick,
}
