// Overlay registry: id -> (record, element handle, menu handle) side-table.
// Every live overlay has exactly one menu; both are created and destroyed together.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::error::OverlayError;
use crate::renderer::Renderer;
use crate::style::{compute_menu_anchor_with_inset, compute_overlay_box, MENU_INSET};
use crate::types::{clamp_opacity, Overlay, OverlayId, OverlayPatch};

struct Entry<R: Renderer> {
    overlay: Overlay,
    element: R::Element,
    menu: R::Menu,
    menu_open: bool,
}

/// In-page collection of live overlays, generic over the rendering surface.
pub struct OverlayRegistry<R: Renderer> {
    renderer: R,
    entries: HashMap<OverlayId, Entry<R>>,
    menu_inset: i32,
}

impl<R: Renderer> OverlayRegistry<R> {
    pub fn new(renderer: R) -> Self {
        Self::with_menu_inset(renderer, MENU_INSET)
    }

    pub fn with_menu_inset(renderer: R, menu_inset: i32) -> Self {
        OverlayRegistry {
            renderer,
            entries: HashMap::new(),
            menu_inset,
        }
    }

    /// Insert and render a new overlay plus its menu.
    pub fn create(&mut self, overlay: Overlay) -> Result<&Overlay, OverlayError> {
        if self.entries.contains_key(&overlay.id) {
            return Err(OverlayError::DuplicateId(overlay.id));
        }
        if !overlay.size.is_valid() {
            return Err(OverlayError::InvalidPayload(format!(
                "size must be positive, got {}x{}",
                overlay.size.width, overlay.size.height
            )));
        }

        let mut overlay = overlay;
        overlay.opacity = clamp_opacity(overlay.opacity);

        let element = self.renderer.create_overlay(&overlay.id, &overlay.image_url)?;
        let menu = match self.renderer.create_menu(&overlay) {
            Ok(menu) => menu,
            Err(err) => {
                // No overlay may exist without its menu.
                self.renderer.destroy_overlay(element);
                return Err(err);
            }
        };

        self.renderer.apply_box(&element, &compute_overlay_box(&overlay));
        self.renderer.set_drag_enabled(&element, !overlay.locked);
        self.renderer.place_menu(
            &menu,
            compute_menu_anchor_with_inset(&overlay, self.menu_inset),
        );
        self.renderer.sync_menu(&menu, &overlay);

        info!("overlay {} created", overlay.id);
        let id = overlay.id.clone();
        self.entries.insert(
            id.clone(),
            Entry {
                overlay,
                element,
                menu,
                menu_open: false,
            },
        );
        Ok(&self.entries[&id].overlay)
    }

    /// Apply a partial update. Nothing is mutated when validation fails.
    pub fn update(&mut self, id: &OverlayId, patch: &OverlayPatch) -> Result<&Overlay, OverlayError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| OverlayError::NotFound(id.clone()))?;

        if let Some(size) = patch.size {
            if !size.is_valid() {
                return Err(OverlayError::InvalidPayload(format!(
                    "size must be positive, got {}x{}",
                    size.width, size.height
                )));
            }
        }

        let was_locked = entry.overlay.locked;
        entry.overlay.apply(patch);
        let overlay = &entry.overlay;

        self.renderer.apply_box(&entry.element, &compute_overlay_box(overlay));
        if overlay.locked != was_locked {
            self.renderer.set_drag_enabled(&entry.element, !overlay.locked);
            debug!("overlay {} locked={}", id, overlay.locked);
        }
        if patch.touches_geometry() {
            self.renderer.place_menu(
                &entry.menu,
                compute_menu_anchor_with_inset(overlay, self.menu_inset),
            );
        }
        self.renderer.sync_menu(&entry.menu, overlay);

        Ok(&entry.overlay)
    }

    /// Destroy an overlay and its menu. Absent ids are a no-op.
    pub fn remove(&mut self, id: &OverlayId) -> Option<Overlay> {
        let entry = self.entries.remove(id)?;
        self.renderer.destroy_menu(entry.menu);
        self.renderer.destroy_overlay(entry.element);
        info!("overlay {} removed", id);
        Some(entry.overlay)
    }

    pub fn clear(&mut self) {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            self.renderer.destroy_menu(entry.menu);
            self.renderer.destroy_overlay(entry.element);
        }
        if count > 0 {
            info!("cleared {} overlays", count);
        }
    }

    pub fn get(&self, id: &OverlayId) -> Option<&Overlay> {
        self.entries.get(id).map(|e| &e.overlay)
    }

    pub fn contains(&self, id: &OverlayId) -> bool {
        self.entries.contains_key(id)
    }

    /// Snapshot of every record. Order is unspecified.
    pub fn list(&self) -> Vec<Overlay> {
        self.entries.values().map(|e| e.overlay.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_menu_open(&self, id: &OverlayId) -> bool {
        self.entries.get(id).map(|e| e.menu_open).unwrap_or(false)
    }

    pub fn set_menu_open(&mut self, id: &OverlayId, open: bool) -> Result<(), OverlayError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| OverlayError::NotFound(id.clone()))?;
        if entry.menu_open != open {
            entry.menu_open = open;
            self.renderer.set_menu_open(&entry.menu, open);
        }
        Ok(())
    }

    /// Close every open menu except `keep`.
    pub fn close_menus_except(&mut self, keep: Option<&OverlayId>) {
        for (id, entry) in self.entries.iter_mut() {
            if entry.menu_open && Some(id) != keep {
                entry.menu_open = false;
                self.renderer.set_menu_open(&entry.menu, false);
            }
        }
    }

    /// Re-parent anything the host page detached. Returns how many overlays needed it.
    pub fn reattach_detached(&mut self) -> usize {
        let mut count = 0;
        for (id, entry) in self.entries.iter() {
            if self.renderer.ensure_attached(&entry.element, &entry.menu) {
                warn!("overlay {} was detached by the page, reattached", id);
                count += 1;
            }
        }
        count
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}
