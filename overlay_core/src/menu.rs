// Per-overlay menu: freeze, hide, resize, delete, transparency.
// The menu is a separate element so it stays clickable while its overlay is frozen.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::OverlayError;
use crate::registry::OverlayRegistry;
use crate::renderer::Renderer;
use crate::types::{OverlayId, OverlayPatch, Size};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MenuAction {
    ToggleFreeze,
    ToggleHide,
    /// Raw text from the width/height prompts; validated before any mutation.
    Resize { width: String, height: String },
    Delete,
    /// Slider value, 0-100 percent.
    SetTransparency { percent: f64 },
}

/// What a successful action did.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuOutcome {
    Updated(OverlayPatch),
    Deleted,
}

/// Validate resize prompt input. Both values must be positive integers.
pub fn parse_dimensions(width: &str, height: &str) -> Result<Size, OverlayError> {
    let size = Size::new(parse_dimension("width", width)?, parse_dimension("height", height)?);
    Ok(size)
}

fn parse_dimension(name: &str, raw: &str) -> Result<u32, OverlayError> {
    let trimmed = raw.trim();
    match trimmed.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(OverlayError::InvalidPayload(format!(
            "{} must be a positive integer, got {:?}",
            name, trimmed
        ))),
    }
}

/// Map a 0-100 slider value to opacity.
pub fn transparency_to_opacity(percent: f64) -> f64 {
    if percent.is_nan() {
        return 1.0;
    }
    percent.clamp(0.0, 100.0) / 100.0
}

/// Run one menu action against the registry.
pub fn apply_action<R: Renderer>(
    registry: &mut OverlayRegistry<R>,
    id: &OverlayId,
    action: &MenuAction,
) -> Result<MenuOutcome, OverlayError> {
    let (locked, visible) = registry
        .get(id)
        .map(|o| (o.locked, o.visible))
        .ok_or_else(|| OverlayError::NotFound(id.clone()))?;

    let patch = match action {
        MenuAction::ToggleFreeze => OverlayPatch::locked(!locked),
        MenuAction::ToggleHide => OverlayPatch::visible(!visible),
        MenuAction::Resize { width, height } => OverlayPatch::size(parse_dimensions(width, height)?),
        MenuAction::SetTransparency { percent } => {
            OverlayPatch::opacity(transparency_to_opacity(*percent))
        }
        MenuAction::Delete => {
            registry.remove(id);
            return Ok(MenuOutcome::Deleted);
        }
    };

    registry.update(id, &patch)?;
    debug!("menu action {:?} applied to {}", action, id);
    Ok(MenuOutcome::Updated(patch))
}

/// Flip the dropdown for `id`, closing every other open menu.
pub fn toggle_open<R: Renderer>(
    registry: &mut OverlayRegistry<R>,
    id: &OverlayId,
) -> Result<bool, OverlayError> {
    let open = !registry.is_menu_open(id);
    registry.close_menus_except(Some(id));
    registry.set_menu_open(id, open)?;
    Ok(open)
}

/// A click landed outside every menu.
pub fn close_all<R: Renderer>(registry: &mut OverlayRegistry<R>) {
    registry.close_menus_except(None);
}
