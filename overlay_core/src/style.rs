// Coordinate/style engine: overlay record -> concrete CSS box, overlay -> menu anchor.
// Pure functions only. The DOM renderer turns these into style properties.

use serde::{Deserialize, Serialize};

use crate::types::Overlay;

/// Default inset of the menu anchor from the overlay's bottom-right corner (px).
pub const MENU_INSET: i32 = 30;

/// Overlays sit just under the top of the stacking range so host pages rarely cover them.
pub const OVERLAY_Z_INDEX: i32 = 2_147_483_000;

/// Menus stack above every overlay.
pub const MENU_Z_INDEX: i32 = OVERLAY_Z_INDEX + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Display {
    Shown,
    Hidden,
}

impl Display {
    pub fn css(&self) -> &'static str {
        match self {
            Display::Shown => "block",
            Display::Hidden => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerEvents {
    Auto,
    None,
}

impl PointerEvents {
    pub fn css(&self) -> &'static str {
        match self {
            PointerEvents::Auto => "auto",
            PointerEvents::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cursor {
    Move,
    Default,
}

impl Cursor {
    pub fn css(&self) -> &'static str {
        match self {
            Cursor::Move => "move",
            Cursor::Default => "default",
        }
    }
}

/// Border treatment. Frozen overlays get a distinct outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Border {
    Normal,
    Frozen,
}

impl Border {
    pub fn css(&self) -> &'static str {
        match self {
            Border::Normal => "1px dashed rgba(0, 120, 255, 0.8)",
            Border::Frozen => "2px solid rgba(255, 64, 64, 0.9)",
        }
    }
}

/// How the image sits inside the box. Always letterboxed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFit {
    Contain,
}

impl ImageFit {
    pub fn css(&self) -> &'static str {
        match self {
            ImageFit::Contain => "contain",
        }
    }
}

/// Concrete visual box for one overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxStyle {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    pub opacity: f64,
    pub display: Display,
    pub z_index: i32,
    pub pointer_events: PointerEvents,
    pub cursor: Cursor,
    pub border: Border,
    pub fit: ImageFit,
}

/// Menu anchor in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuAnchor {
    pub x: i32,
    pub y: i32,
}

pub fn compute_overlay_box(overlay: &Overlay) -> BoxStyle {
    let (pointer_events, cursor, border) = if overlay.locked {
        (PointerEvents::None, Cursor::Default, Border::Frozen)
    } else {
        (PointerEvents::Auto, Cursor::Move, Border::Normal)
    };

    BoxStyle {
        left: overlay.position.x,
        top: overlay.position.y,
        width: overlay.size.width,
        height: overlay.size.height,
        opacity: overlay.opacity,
        display: if overlay.visible {
            Display::Shown
        } else {
            Display::Hidden
        },
        z_index: OVERLAY_Z_INDEX,
        pointer_events,
        cursor,
        border,
        fit: ImageFit::Contain,
    }
}

pub fn compute_menu_anchor(overlay: &Overlay) -> MenuAnchor {
    compute_menu_anchor_with_inset(overlay, MENU_INSET)
}

/// Bottom-right corner pulled in by `inset` on both axes.
pub fn compute_menu_anchor_with_inset(overlay: &Overlay, inset: i32) -> MenuAnchor {
    let right = i64::from(overlay.position.x) + i64::from(overlay.size.width) - i64::from(inset);
    let bottom = i64::from(overlay.position.y) + i64::from(overlay.size.height) - i64::from(inset);
    MenuAnchor {
        x: saturate(right),
        y: saturate(bottom),
    }
}

fn saturate(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OverlayId, Position, Size};
    use proptest::prelude::*;

    fn overlay(x: i32, y: i32, w: u32, h: u32, visible: bool, locked: bool) -> Overlay {
        Overlay {
            id: OverlayId::from("A"),
            image_url: "data:image/png;base64,AAAA".to_string(),
            position: Position::new(x, y),
            size: Size::new(w, h),
            opacity: 0.7,
            visible,
            locked,
        }
    }

    #[test]
    fn box_maps_record_fields() {
        let style = compute_overlay_box(&overlay(10, 20, 300, 200, true, false));
        assert_eq!(style.left, 10);
        assert_eq!(style.top, 20);
        assert_eq!(style.width, 300);
        assert_eq!(style.height, 200);
        assert_eq!(style.opacity, 0.7);
        assert_eq!(style.display, Display::Shown);
        assert_eq!(style.pointer_events, PointerEvents::Auto);
        assert_eq!(style.cursor, Cursor::Move);
        assert_eq!(style.fit, ImageFit::Contain);
    }

    #[test]
    fn locked_and_hidden_box() {
        let style = compute_overlay_box(&overlay(0, 0, 1, 1, false, true));
        assert_eq!(style.display, Display::Hidden);
        assert_eq!(style.pointer_events, PointerEvents::None);
        assert_eq!(style.border, Border::Frozen);
        assert_eq!(style.display.css(), "none");
    }

    #[test]
    fn menu_anchor_bottom_right_inset() {
        let anchor = compute_menu_anchor(&overlay(10, 20, 300, 200, true, false));
        assert_eq!(anchor, MenuAnchor { x: 280, y: 190 });
    }

    #[test]
    fn menus_stack_above_overlays() {
        assert!(MENU_Z_INDEX > OVERLAY_Z_INDEX);
    }

    proptest! {
        #[test]
        fn box_is_deterministic_and_faithful(
            x in -5_000i32..5_000,
            y in -5_000i32..5_000,
            w in 1u32..10_000,
            h in 1u32..10_000,
            visible in any::<bool>(),
            locked in any::<bool>(),
        ) {
            let o = overlay(x, y, w, h, visible, locked);
            let first = compute_overlay_box(&o);
            prop_assert_eq!(&first, &compute_overlay_box(&o));
            prop_assert_eq!(first.left, x);
            prop_assert_eq!(first.top, y);
            prop_assert_eq!(first.width, w);
            prop_assert_eq!(first.height, h);
            prop_assert_eq!(first.display == Display::Shown, visible);
            prop_assert_eq!(first.pointer_events == PointerEvents::None, locked);
        }

        #[test]
        fn menu_anchor_formula(
            x in -5_000i32..5_000,
            y in -5_000i32..5_000,
            w in 1u32..10_000,
            h in 1u32..10_000,
        ) {
            let o = overlay(x, y, w, h, true, false);
            let anchor = compute_menu_anchor(&o);
            prop_assert_eq!(anchor.x, x + w as i32 - MENU_INSET);
            prop_assert_eq!(anchor.y, y + h as i32 - MENU_INSET);
        }
    }
}
