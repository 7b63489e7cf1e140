// DOM renderer (wasm32 only). Overlays are fixed-position divs wrapping a contained <img>;
// each menu is a separate fixed div so it stays clickable while its overlay is frozen.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, HtmlElement, HtmlInputElement, PointerEvent};

use crate::error::OverlayError;
use crate::input::InputEvent;
use crate::menu::MenuAction;
use crate::renderer::Renderer;
use crate::style::{BoxStyle, MenuAnchor, MENU_Z_INDEX};
use crate::types::{Overlay, OverlayId};

/// Late-bound input handler. Set once the page agent exists.
pub type InputSink = Rc<RefCell<Option<Box<dyn FnMut(InputEvent)>>>>;

pub fn emit(sink: &InputSink, event: InputEvent) {
    match sink.try_borrow_mut() {
        Ok(mut slot) => {
            if let Some(handler) = slot.as_mut() {
                handler(event);
            }
        }
        Err(_) => warn!("input dropped while the agent was busy: {:?}", event),
    }
}

pub(crate) fn js_err(context: &str, err: JsValue) -> OverlayError {
    OverlayError::Render(format!("{}: {:?}", context, err))
}

pub struct DomOverlay {
    root: HtmlElement,
    on_pointer_down: Closure<dyn FnMut(PointerEvent)>,
    listening: Cell<bool>,
}

pub struct DomMenu {
    root: HtmlElement,
    panel: HtmlElement,
    freeze_button: Element,
    hide_button: Element,
    slider: HtmlInputElement,
    _listeners: Vec<Closure<dyn FnMut(Event)>>,
}

pub struct DomRenderer {
    document: Document,
    sink: InputSink,
}

impl DomRenderer {
    pub fn new(document: Document, sink: InputSink) -> Self {
        DomRenderer { document, sink }
    }

    fn html(&self, tag: &str) -> Result<HtmlElement, OverlayError> {
        self.document
            .create_element(tag)
            .map_err(|e| js_err("create element", e))?
            .dyn_into::<HtmlElement>()
            .map_err(|_| OverlayError::Render(format!("<{}> is not an HTML element", tag)))
    }

    fn button(&self, label: &str) -> Result<Element, OverlayError> {
        let button = self
            .document
            .create_element("button")
            .map_err(|e| js_err("create button", e))?;
        let _ = button.set_attribute("type", "button");
        button.set_text_content(Some(label));
        Ok(button)
    }

    fn mount(&self, element: &HtmlElement) -> Result<(), OverlayError> {
        let body = self
            .document
            .body()
            .ok_or_else(|| OverlayError::Render("document has no body".to_string()))?;
        body.append_child(element)
            .map_err(|e| js_err("append to body", e))?;
        Ok(())
    }

    /// Click listener that turns a click into one menu event.
    fn on_click(
        &self,
        target: &Element,
        make_event: impl Fn() -> Option<InputEvent> + 'static,
    ) -> Result<Closure<dyn FnMut(Event)>, OverlayError> {
        let sink = Rc::clone(&self.sink);
        let listener = Closure::wrap(Box::new(move |event: Event| {
            event.prevent_default();
            if let Some(input) = make_event() {
                emit(&sink, input);
            }
        }) as Box<dyn FnMut(Event)>);
        target
            .add_event_listener_with_callback("click", listener.as_ref().unchecked_ref())
            .map_err(|e| js_err("add click listener", e))?;
        Ok(listener)
    }
}

fn set_styles(element: &HtmlElement, properties: &[(&str, String)]) {
    let style = element.style();
    for (name, value) in properties {
        if let Err(err) = style.set_property(name, value) {
            warn!("failed to set {}: {:?}", name, err);
        }
    }
}

fn menu_action(overlay_id: &OverlayId, action: MenuAction) -> InputEvent {
    InputEvent::MenuAction {
        overlay_id: overlay_id.clone(),
        action,
    }
}

fn prompt(message: &str) -> Option<String> {
    web_sys::window()?
        .prompt_with_message_and_default(message, "")
        .ok()
        .flatten()
}

impl Renderer for DomRenderer {
    type Element = DomOverlay;
    type Menu = DomMenu;

    fn create_overlay(&mut self, id: &OverlayId, image_url: &str) -> Result<DomOverlay, OverlayError> {
        let root = self.html("div")?;
        root.set_class_name("pp-overlay");
        let _ = root.set_attribute("data-overlay-id", id.as_str());
        set_styles(
            &root,
            &[
                ("position", "fixed".to_string()),
                ("box-sizing", "border-box".to_string()),
                ("user-select", "none".to_string()),
                ("touch-action", "none".to_string()),
            ],
        );

        let image = self.html("img")?;
        let _ = image.set_attribute("src", image_url);
        let _ = image.set_attribute("draggable", "false");
        set_styles(
            &image,
            &[
                ("display", "block".to_string()),
                ("width", "100%".to_string()),
                ("height", "100%".to_string()),
                ("pointer-events", "none".to_string()),
            ],
        );
        root.append_child(&image)
            .map_err(|e| js_err("append image", e))?;
        self.mount(&root)?;

        let sink = Rc::clone(&self.sink);
        let overlay_id = id.clone();
        let target = root.clone();
        let on_pointer_down = Closure::wrap(Box::new(move |event: PointerEvent| {
            if event.button() != 0 {
                return;
            }
            event.prevent_default();
            // Keeps pointerup flowing to us when the release happens outside the window.
            if let Err(err) = target.set_pointer_capture(event.pointer_id()) {
                debug!("pointer capture refused: {:?}", err);
            }
            emit(
                &sink,
                InputEvent::PointerDown {
                    overlay_id: overlay_id.clone(),
                    x: event.client_x(),
                    y: event.client_y(),
                },
            );
        }) as Box<dyn FnMut(PointerEvent)>);

        Ok(DomOverlay {
            root,
            on_pointer_down,
            listening: Cell::new(false),
        })
    }

    fn apply_box(&mut self, element: &DomOverlay, style: &BoxStyle) {
        if let Some(image) = element.root.first_element_child() {
            if let Ok(image) = image.dyn_into::<HtmlElement>() {
                set_styles(&image, &[("object-fit", style.fit.css().to_string())]);
            }
        }
        set_styles(
            &element.root,
            &[
                ("left", format!("{}px", style.left)),
                ("top", format!("{}px", style.top)),
                ("width", format!("{}px", style.width)),
                ("height", format!("{}px", style.height)),
                ("opacity", style.opacity.to_string()),
                ("display", style.display.css().to_string()),
                ("z-index", style.z_index.to_string()),
                ("pointer-events", style.pointer_events.css().to_string()),
                ("cursor", style.cursor.css().to_string()),
                ("border", style.border.css().to_string()),
            ],
        );
    }

    fn set_drag_enabled(&mut self, element: &DomOverlay, enabled: bool) {
        if element.listening.get() == enabled {
            return;
        }
        let callback = element.on_pointer_down.as_ref().unchecked_ref();
        let result = if enabled {
            element
                .root
                .add_event_listener_with_callback("pointerdown", callback)
        } else {
            element
                .root
                .remove_event_listener_with_callback("pointerdown", callback)
        };
        match result {
            Ok(()) => element.listening.set(enabled),
            Err(err) => warn!("failed to toggle drag listener: {:?}", err),
        }
    }

    fn destroy_overlay(&mut self, element: DomOverlay) {
        self.set_drag_enabled(&element, false);
        element.root.remove();
    }

    fn create_menu(&mut self, overlay: &Overlay) -> Result<DomMenu, OverlayError> {
        let id = &overlay.id;
        let root = self.html("div")?;
        root.set_class_name("pp-overlay-menu");
        set_styles(
            &root,
            &[
                ("position", "fixed".to_string()),
                ("z-index", MENU_Z_INDEX.to_string()),
                ("font", "12px sans-serif".to_string()),
            ],
        );

        let toggle = self.button("☰")?;
        let panel = self.html("div")?;
        set_styles(
            &panel,
            &[
                ("display", "none".to_string()),
                ("background", "#fff".to_string()),
                ("border", "1px solid #ccc".to_string()),
                ("padding", "4px".to_string()),
            ],
        );

        let freeze_button = self.button("Freeze")?;
        let hide_button = self.button("Hide")?;
        let resize_button = self.button("Resize")?;
        let delete_button = self.button("Delete")?;
        let slider = self
            .document
            .create_element("input")
            .map_err(|e| js_err("create slider", e))?
            .dyn_into::<HtmlInputElement>()
            .map_err(|_| OverlayError::Render("input is not an input element".to_string()))?;
        slider.set_type("range");
        slider.set_min("0");
        slider.set_max("100");
        slider.set_step("1");

        for child in [&freeze_button, &hide_button, &resize_button, &delete_button] {
            panel
                .append_child(child)
                .map_err(|e| js_err("append menu button", e))?;
        }
        panel
            .append_child(&slider)
            .map_err(|e| js_err("append slider", e))?;
        root.append_child(&toggle)
            .map_err(|e| js_err("append toggle", e))?;
        root.append_child(&panel)
            .map_err(|e| js_err("append panel", e))?;

        let mut listeners = Vec::new();

        // Clicks inside the menu must not reach the document's click-outside handler.
        let stop = Closure::wrap(Box::new(|event: Event| event.stop_propagation())
            as Box<dyn FnMut(Event)>);
        root.add_event_listener_with_callback("click", stop.as_ref().unchecked_ref())
            .map_err(|e| js_err("add menu click guard", e))?;
        listeners.push(stop);

        let target = id.clone();
        listeners.push(self.on_click(&toggle, move || {
            Some(InputEvent::MenuToggle {
                overlay_id: target.clone(),
            })
        })?);
        let target = id.clone();
        listeners.push(self.on_click(&freeze_button, move || {
            Some(menu_action(&target, MenuAction::ToggleFreeze))
        })?);
        let target = id.clone();
        listeners.push(self.on_click(&hide_button, move || {
            Some(menu_action(&target, MenuAction::ToggleHide))
        })?);
        let target = id.clone();
        listeners.push(self.on_click(&resize_button, move || {
            let width = prompt("Width (px)")?;
            let height = prompt("Height (px)")?;
            Some(menu_action(&target, MenuAction::Resize { width, height }))
        })?);
        let target = id.clone();
        listeners.push(self.on_click(&delete_button, move || {
            Some(menu_action(&target, MenuAction::Delete))
        })?);

        let sink = Rc::clone(&self.sink);
        let target = id.clone();
        let slider_handle = slider.clone();
        let on_input = Closure::wrap(Box::new(move |_event: Event| {
            if let Ok(percent) = slider_handle.value().parse::<f64>() {
                emit(&sink, menu_action(&target, MenuAction::SetTransparency { percent }));
            }
        }) as Box<dyn FnMut(Event)>);
        slider
            .add_event_listener_with_callback("input", on_input.as_ref().unchecked_ref())
            .map_err(|e| js_err("add slider listener", e))?;
        listeners.push(on_input);

        self.mount(&root)?;
        Ok(DomMenu {
            root,
            panel,
            freeze_button,
            hide_button,
            slider,
            _listeners: listeners,
        })
    }

    fn place_menu(&mut self, menu: &DomMenu, anchor: MenuAnchor) {
        set_styles(
            &menu.root,
            &[
                ("left", format!("{}px", anchor.x)),
                ("top", format!("{}px", anchor.y)),
            ],
        );
    }

    fn sync_menu(&mut self, menu: &DomMenu, overlay: &Overlay) {
        menu.freeze_button
            .set_text_content(Some(if overlay.locked { "Unfreeze" } else { "Freeze" }));
        menu.hide_button
            .set_text_content(Some(if overlay.visible { "Hide" } else { "Show" }));
        menu.slider
            .set_value(&format!("{}", (overlay.opacity * 100.0).round()));
    }

    fn set_menu_open(&mut self, menu: &DomMenu, open: bool) {
        let display = if open { "block" } else { "none" };
        set_styles(&menu.panel, &[("display", display.to_string())]);
    }

    fn destroy_menu(&mut self, menu: DomMenu) {
        menu.root.remove();
    }

    fn ensure_attached(&mut self, element: &DomOverlay, menu: &DomMenu) -> bool {
        let mut reattached = false;
        for root in [&element.root, &menu.root] {
            if !root.is_connected() {
                match self.mount(root) {
                    Ok(()) => reattached = true,
                    Err(err) => warn!("reattach failed: {}", err),
                }
            }
        }
        reattached
    }
}

#[cfg(test)]
mod wasm_tests {
    use super::*;
    use crate::registry::OverlayRegistry;
    use crate::types::{Position, Size};
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn overlay() -> Overlay {
        Overlay {
            id: OverlayId::from("dom-A"),
            image_url: "data:image/png;base64,AAAA".to_string(),
            position: Position::new(5, 6),
            size: Size::new(120, 80),
            opacity: 0.4,
            visible: true,
            locked: false,
        }
    }

    #[wasm_bindgen_test]
    fn create_and_remove_mounts_and_unmounts() {
        let document = web_sys::window().unwrap().document().unwrap();
        let sink: InputSink = Rc::new(RefCell::new(None));
        let mut registry = OverlayRegistry::new(DomRenderer::new(document.clone(), sink));
        registry.create(overlay()).unwrap();

        let found = document.query_selector("[data-overlay-id='dom-A']").unwrap();
        assert!(found.is_some());

        registry.remove(&OverlayId::from("dom-A"));
        let found = document.query_selector("[data-overlay-id='dom-A']").unwrap();
        assert!(found.is_none());
    }
}
