// Overlay data model. Newtypes for ids, integer pixel geometry, partial updates.
// Wire names are camelCase to match the extension's JSON messages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque overlay identifier, assigned by the controlling UI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayId(String);

impl OverlayId {
    pub fn new(id: impl Into<String>) -> Self {
        OverlayId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OverlayId {
    fn from(id: &str) -> Self {
        OverlayId(id.to_string())
    }
}

/// Pixel offset from the viewport origin. May go negative when dragged off-screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Position { x, y }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Position::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

/// Pixel box. Both sides must be strictly positive for a live overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Size { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// One reference-image layer pinned to a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlay {
    pub id: OverlayId,
    pub image_url: String,
    pub position: Position,
    pub size: Size,
    pub opacity: f64,
    pub visible: bool,
    pub locked: bool,
}

impl Overlay {
    /// Apply the fields present in `patch`. Callers validate first.
    pub fn apply(&mut self, patch: &OverlayPatch) {
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(size) = patch.size {
            self.size = size;
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = clamp_opacity(opacity);
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(locked) = patch.locked {
            self.locked = locked;
        }
    }
}

/// Partial update. `id` and `imageUrl` are immutable and therefore absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OverlayPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
}

impl OverlayPatch {
    pub fn position(position: Position) -> Self {
        OverlayPatch {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn size(size: Size) -> Self {
        OverlayPatch {
            size: Some(size),
            ..Default::default()
        }
    }

    pub fn opacity(opacity: f64) -> Self {
        OverlayPatch {
            opacity: Some(opacity),
            ..Default::default()
        }
    }

    pub fn visible(visible: bool) -> Self {
        OverlayPatch {
            visible: Some(visible),
            ..Default::default()
        }
    }

    pub fn locked(locked: bool) -> Self {
        OverlayPatch {
            locked: Some(locked),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.size.is_none()
            && self.opacity.is_none()
            && self.visible.is_none()
            && self.locked.is_none()
    }

    /// True when the patch moves or resizes the box (menu must follow).
    pub fn touches_geometry(&self) -> bool {
        self.position.is_some() || self.size.is_some()
    }
}

/// Clamp into [0,1]; NaN collapses to fully opaque.
pub fn clamp_opacity(opacity: f64) -> f64 {
    if opacity.is_nan() {
        1.0
    } else {
        opacity.clamp(0.0, 1.0)
    }
}
