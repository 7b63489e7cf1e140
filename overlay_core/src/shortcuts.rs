// Global keyboard shortcuts. Independent of drag state; act on every registered overlay.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::OverlayError;
use crate::registry::OverlayRegistry;
use crate::renderer::Renderer;
use crate::types::{OverlayId, OverlayPatch};

/// A key plus modifier state, as reported by a keydown event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KeyChord {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyChord {
    pub fn key(key: impl Into<String>) -> Self {
        KeyChord {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Parse `"Ctrl+Shift+O"` style bindings. Modifiers are case-insensitive.
    pub fn parse(binding: &str) -> Result<Self, OverlayError> {
        let mut chord = KeyChord::default();
        let mut key = None;

        for part in binding.split('+').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "" => {
                    return Err(OverlayError::InvalidPayload(format!(
                        "empty key in shortcut {:?}",
                        binding
                    )))
                }
                "ctrl" | "control" => chord.ctrl = true,
                "shift" => chord.shift = true,
                "alt" | "option" => chord.alt = true,
                "meta" | "cmd" | "command" => chord.meta = true,
                _ => {
                    if key.replace(part.to_string()).is_some() {
                        return Err(OverlayError::InvalidPayload(format!(
                            "shortcut {:?} names more than one key",
                            binding
                        )));
                    }
                }
            }
        }

        chord.key = key.ok_or_else(|| {
            OverlayError::InvalidPayload(format!("shortcut {:?} has no key", binding))
        })?;
        Ok(chord)
    }

    /// Exact modifier match; keys compare case-insensitively ("o" vs "O" under Shift).
    pub fn matches(&self, pressed: &KeyChord) -> bool {
        self.ctrl == pressed.ctrl
            && self.shift == pressed.shift
            && self.alt == pressed.alt
            && self.meta == pressed.meta
            && self.key.eq_ignore_ascii_case(&pressed.key)
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (on, name) in [
            (self.ctrl, "Ctrl+"),
            (self.shift, "Shift+"),
            (self.alt, "Alt+"),
            (self.meta, "Meta+"),
        ] {
            if on {
                f.write_str(name)?;
            }
        }
        f.write_str(&self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    ToggleAll,
    HideAll,
}

/// Configured bindings.
#[derive(Debug, Clone)]
pub struct Shortcuts {
    toggle_all: KeyChord,
    hide_all: KeyChord,
}

impl Shortcuts {
    pub fn new(toggle_all: &str, hide_all: &str) -> Result<Self, OverlayError> {
        Ok(Shortcuts {
            toggle_all: KeyChord::parse(toggle_all)?,
            hide_all: KeyChord::parse(hide_all)?,
        })
    }

    pub fn resolve(&self, pressed: &KeyChord) -> Option<ShortcutAction> {
        if self.toggle_all.matches(pressed) {
            Some(ShortcutAction::ToggleAll)
        } else if self.hide_all.matches(pressed) {
            Some(ShortcutAction::HideAll)
        } else {
            None
        }
    }
}

/// Hide everything if anything is visible, otherwise show everything.
/// Returns the ids whose visibility actually changed.
pub fn toggle_all<R: Renderer>(registry: &mut OverlayRegistry<R>) -> (bool, Vec<OverlayId>) {
    let any_visible = registry.list().iter().any(|o| o.visible);
    let target = !any_visible;
    (target, set_all_visible(registry, target))
}

pub fn hide_all<R: Renderer>(registry: &mut OverlayRegistry<R>) -> Vec<OverlayId> {
    set_all_visible(registry, false)
}

fn set_all_visible<R: Renderer>(registry: &mut OverlayRegistry<R>, visible: bool) -> Vec<OverlayId> {
    let mut changed = Vec::new();
    for overlay in registry.list() {
        if overlay.visible == visible {
            continue;
        }
        if registry.update(&overlay.id, &OverlayPatch::visible(visible)).is_ok() {
            changed.push(overlay.id);
        }
    }
    debug!("set {} overlays visible={}", changed.len(), visible);
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::testing::{sample_overlay, FakeRenderer};

    #[test]
    fn parse_chord() {
        let chord = KeyChord::parse("Ctrl+Shift+O").unwrap();
        assert!(chord.ctrl && chord.shift && !chord.alt && !chord.meta);
        assert_eq!(chord.key, "O");
        assert_eq!(chord.to_string(), "Ctrl+Shift+O");

        assert_eq!(KeyChord::parse("Escape").unwrap(), KeyChord::key("Escape"));
    }

    #[test]
    fn parse_rejects_bad_bindings() {
        assert!(KeyChord::parse("Ctrl+Shift").is_err());
        assert!(KeyChord::parse("Ctrl++O").is_err());
        assert!(KeyChord::parse("A+B").is_err());
    }

    #[test]
    fn resolve_requires_exact_modifiers() {
        let shortcuts = Shortcuts::new("Ctrl+Shift+O", "Escape").unwrap();
        let pressed = KeyChord {
            key: "o".to_string(),
            ctrl: true,
            shift: true,
            ..Default::default()
        };
        assert_eq!(shortcuts.resolve(&pressed), Some(ShortcutAction::ToggleAll));

        let no_shift = KeyChord {
            key: "o".to_string(),
            ctrl: true,
            ..Default::default()
        };
        assert_eq!(shortcuts.resolve(&no_shift), None);
        assert_eq!(
            shortcuts.resolve(&KeyChord::key("Escape")),
            Some(ShortcutAction::HideAll)
        );
    }

    #[test]
    fn toggle_all_with_mixed_visibility() {
        let mut registry = OverlayRegistry::new(FakeRenderer::new());
        registry.create(sample_overlay("A")).unwrap();
        let mut hidden = sample_overlay("B");
        hidden.visible = false;
        registry.create(hidden).unwrap();

        let (visible, changed) = toggle_all(&mut registry);
        assert!(!visible);
        assert_eq!(changed, vec![OverlayId::from("A")]);
        assert!(registry.list().iter().all(|o| !o.visible));

        let (visible, changed) = toggle_all(&mut registry);
        assert!(visible);
        assert_eq!(changed.len(), 2);
        assert!(registry.list().iter().all(|o| o.visible));
    }

    #[test]
    fn hide_all_is_unconditional() {
        let mut registry = OverlayRegistry::new(FakeRenderer::new());
        registry.create(sample_overlay("A")).unwrap();
        assert_eq!(hide_all(&mut registry).len(), 1);
        assert!(hide_all(&mut registry).is_empty());
        assert!(!registry.get(&OverlayId::from("A")).unwrap().visible);
    }
}
