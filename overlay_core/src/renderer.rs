// Abstract rendering surface. The registry drives it; the DOM implementation lives in dom.rs.

use crate::error::OverlayError;
use crate::style::{BoxStyle, MenuAnchor};
use crate::types::{Overlay, OverlayId};

/// Surface that can show overlay elements and their menus.
///
/// Handles are owned by the registry's side-table and handed back on every
/// call; implementations never need to look them up by id.
pub trait Renderer {
    type Element;
    type Menu;

    fn create_overlay(&mut self, id: &OverlayId, image_url: &str)
        -> Result<Self::Element, OverlayError>;

    fn apply_box(&mut self, element: &Self::Element, style: &BoxStyle);

    /// Attach or detach the pointer-down listener that starts drags.
    fn set_drag_enabled(&mut self, element: &Self::Element, enabled: bool);

    fn destroy_overlay(&mut self, element: Self::Element);

    fn create_menu(&mut self, overlay: &Overlay) -> Result<Self::Menu, OverlayError>;

    fn place_menu(&mut self, menu: &Self::Menu, anchor: MenuAnchor);

    /// Refresh labels and the transparency control from the current record.
    fn sync_menu(&mut self, menu: &Self::Menu, overlay: &Overlay);

    fn set_menu_open(&mut self, menu: &Self::Menu, open: bool);

    fn destroy_menu(&mut self, menu: Self::Menu);

    /// Re-parent the element and menu if the host page detached them.
    /// Returns true when anything had to be reattached.
    fn ensure_attached(&mut self, element: &Self::Element, menu: &Self::Menu) -> bool;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::*;
    use crate::types::{Position, Size};

    /// Unlocked, visible 300x200 overlay at the origin.
    pub fn sample_overlay(id: &str) -> Overlay {
        Overlay {
            id: OverlayId::from(id),
            image_url: "data:image/png;base64,AAAA".to_string(),
            position: Position::new(0, 0),
            size: Size::new(300, 200),
            opacity: 0.7,
            visible: true,
            locked: false,
        }
    }

    #[derive(Debug, Clone)]
    pub struct FakeElement {
        pub id: OverlayId,
        pub image_url: String,
        pub style: Option<BoxStyle>,
        pub drag_enabled: bool,
        pub attached: bool,
    }

    #[derive(Debug, Clone)]
    pub struct FakeMenu {
        pub id: OverlayId,
        pub anchor: Option<MenuAnchor>,
        pub locked_label: bool,
        pub slider: f64,
        pub open: bool,
        pub attached: bool,
    }

    /// Records every call so tests can assert on what a real surface would show.
    #[derive(Debug, Default)]
    pub struct FakeRenderer {
        next_handle: u64,
        pub elements: HashMap<u64, FakeElement>,
        pub menus: HashMap<u64, FakeMenu>,
        pub fail_menus: bool,
    }

    impl FakeRenderer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn element(&self, id: &str) -> Option<&FakeElement> {
            self.elements.values().find(|e| e.id.as_str() == id)
        }

        pub fn menu(&self, id: &str) -> Option<&FakeMenu> {
            self.menus.values().find(|m| m.id.as_str() == id)
        }

        /// Simulate the host page ripping everything out of the DOM.
        pub fn detach_all(&mut self) {
            for element in self.elements.values_mut() {
                element.attached = false;
            }
            for menu in self.menus.values_mut() {
                menu.attached = false;
            }
        }

        fn handle(&mut self) -> u64 {
            self.next_handle += 1;
            self.next_handle
        }
    }

    impl Renderer for FakeRenderer {
        type Element = u64;
        type Menu = u64;

        fn create_overlay(&mut self, id: &OverlayId, image_url: &str) -> Result<u64, OverlayError> {
            let handle = self.handle();
            self.elements.insert(
                handle,
                FakeElement {
                    id: id.clone(),
                    image_url: image_url.to_string(),
                    style: None,
                    drag_enabled: false,
                    attached: true,
                },
            );
            Ok(handle)
        }

        fn apply_box(&mut self, element: &u64, style: &BoxStyle) {
            if let Some(e) = self.elements.get_mut(element) {
                e.style = Some(style.clone());
            }
        }

        fn set_drag_enabled(&mut self, element: &u64, enabled: bool) {
            if let Some(e) = self.elements.get_mut(element) {
                e.drag_enabled = enabled;
            }
        }

        fn destroy_overlay(&mut self, element: u64) {
            self.elements.remove(&element);
        }

        fn create_menu(&mut self, overlay: &Overlay) -> Result<u64, OverlayError> {
            if self.fail_menus {
                return Err(OverlayError::Render("menu unavailable".to_string()));
            }
            let handle = self.handle();
            self.menus.insert(
                handle,
                FakeMenu {
                    id: overlay.id.clone(),
                    anchor: None,
                    locked_label: overlay.locked,
                    slider: overlay.opacity * 100.0,
                    open: false,
                    attached: true,
                },
            );
            Ok(handle)
        }

        fn place_menu(&mut self, menu: &u64, anchor: MenuAnchor) {
            if let Some(m) = self.menus.get_mut(menu) {
                m.anchor = Some(anchor);
            }
        }

        fn sync_menu(&mut self, menu: &u64, overlay: &Overlay) {
            if let Some(m) = self.menus.get_mut(menu) {
                m.locked_label = overlay.locked;
                m.slider = overlay.opacity * 100.0;
            }
        }

        fn set_menu_open(&mut self, menu: &u64, open: bool) {
            if let Some(m) = self.menus.get_mut(menu) {
                m.open = open;
            }
        }

        fn destroy_menu(&mut self, menu: u64) {
            self.menus.remove(&menu);
        }

        fn ensure_attached(&mut self, element: &u64, menu: &u64) -> bool {
            let mut reattached = false;
            if let Some(e) = self.elements.get_mut(element) {
                if !e.attached {
                    e.attached = true;
                    reattached = true;
                }
            }
            if let Some(m) = self.menus.get_mut(menu) {
                if !m.attached {
                    m.attached = true;
                    reattached = true;
                }
            }
            reattached
        }
    }
}
