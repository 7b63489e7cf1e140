// Controlling UI core: owns persisted overlay records keyed by page URL, turns user
// intent into commands and folds page-side notifications back into storage.

use std::collections::HashMap;

use log::{debug, info, warn};
use wasm_bindgen::prelude::*;

use crate::background::AgentLink;
use crate::config::ControllerConfig;
use crate::error::OverlayError;
use crate::protocol::{Command, CommandResult, ControllerMessage, LoadConfigResponse};
use crate::types::{clamp_opacity, Overlay, OverlayId, OverlayPatch, Position, Size};
use crate::validate::{BasicImageValidator, IdGenerator, ImageUpload, ImageValidator, UuidIds};

/// Persisted key-value contract: page URL -> overlay records.
pub trait OverlayStore {
    fn get(&self, url: &str) -> Vec<Overlay>;
    fn set(&mut self, url: &str, overlays: Vec<Overlay>);
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pages: HashMap<String, Vec<Overlay>>,
}

impl OverlayStore for MemoryStore {
    fn get(&self, url: &str) -> Vec<Overlay> {
        self.pages.get(url).cloned().unwrap_or_default()
    }

    fn set(&mut self, url: &str, overlays: Vec<Overlay>) {
        if overlays.is_empty() {
            self.pages.remove(url);
        } else {
            self.pages.insert(url.to_string(), overlays);
        }
    }
}

pub struct OverlayController<S: OverlayStore> {
    config: ControllerConfig,
    store: S,
    current_url: Option<String>,
}

impl<S: OverlayStore> OverlayController<S> {
    pub fn new(config: ControllerConfig, store: S) -> Self {
        OverlayController {
            config,
            store,
            current_url: None,
        }
    }

    /// The page the popup is currently looking at.
    pub fn track_page(&mut self, url: impl Into<String>) {
        self.current_url = Some(url.into());
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub fn overlays(&self, url: &str) -> Vec<Overlay> {
        self.store.get(url)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Validate an uploaded image and produce the commands that put it on the page.
    /// With `replace_on_upload`, every prior overlay for the page is removed first.
    pub fn upload(
        &mut self,
        url: &str,
        upload: ImageUpload,
        validator: &dyn ImageValidator,
        ids: &mut dyn IdGenerator,
    ) -> Result<Vec<Command>, OverlayError> {
        let errors = validator.validate(&upload);
        if !errors.is_empty() {
            return Err(OverlayError::InvalidPayload(errors.join("; ")));
        }

        let mut overlays = self.store.get(url);
        let mut commands = Vec::new();
        if self.config.replace_on_upload {
            commands.extend(overlays.drain(..).map(|o| Command::remove(o.id)));
        }

        let id = ids.next_id();
        if overlays.iter().any(|o| o.id == id) {
            return Err(OverlayError::DuplicateId(id));
        }

        let overlay = Overlay {
            id,
            image_url: upload.data_url,
            position: Position::new(0, 0),
            size: Size::new(upload.width, upload.height),
            opacity: clamp_opacity(self.config.default_opacity),
            visible: true,
            locked: false,
        };
        info!("uploading {} as {} on {}", upload.name, overlay.id, url);

        overlays.push(overlay.clone());
        self.store.set(url, overlays);
        commands.push(Command::CreateOverlay(overlay));
        Ok(commands)
    }

    pub fn update(
        &mut self,
        url: &str,
        id: &OverlayId,
        patch: OverlayPatch,
    ) -> Result<Command, OverlayError> {
        if let Some(size) = patch.size {
            if !size.is_valid() {
                return Err(OverlayError::InvalidPayload(format!(
                    "size must be positive, got {}x{}",
                    size.width, size.height
                )));
            }
        }
        self.modify(url, id, |overlay| overlay.apply(&patch))?;
        Ok(Command::update(id.clone(), patch))
    }

    /// Always succeeds; removing an unknown id is a no-op on both sides.
    pub fn remove(&mut self, url: &str, id: &OverlayId) -> Command {
        let mut overlays = self.store.get(url);
        overlays.retain(|o| &o.id != id);
        self.store.set(url, overlays);
        Command::remove(id.clone())
    }

    /// Flip the stored visibility and send the resulting value, so the page converges
    /// on the stored record even if an earlier page-side change never reached us.
    pub fn toggle_visibility(&mut self, url: &str, id: &OverlayId) -> Result<Command, OverlayError> {
        let mut visible = true;
        self.modify(url, id, |overlay| {
            overlay.visible = !overlay.visible;
            visible = overlay.visible;
        })?;
        Ok(Command::update(id.clone(), OverlayPatch::visible(visible)))
    }

    /// "Clear all" for a page.
    pub fn clear(&mut self, url: &str) -> Vec<Command> {
        let overlays = self.store.get(url);
        self.store.set(url, Vec::new());
        overlays.into_iter().map(|o| Command::remove(o.id)).collect()
    }

    /// Handle a message from a page agent. Never fails past this boundary.
    pub fn handle_message(&mut self, message: ControllerMessage) -> CommandResult {
        match message {
            ControllerMessage::LoadConfig(request) => {
                let response = LoadConfigResponse {
                    overlays: self.store.get(&request.url),
                };
                match serde_json::to_value(&response) {
                    Ok(data) => CommandResult::ok(data),
                    Err(err) => CommandResult::from_error(&OverlayError::from(err)),
                }
            }
            ControllerMessage::OverlayPositionChanged(change) => {
                if !self.is_tracked(&change.url) {
                    debug!("ignoring change for untracked page {}", change.url);
                    return CommandResult::ok("ignored");
                }
                match self.modify(&change.url, &change.overlay_id, |o| o.apply(&change.updates)) {
                    Ok(()) => CommandResult::ok_empty(),
                    Err(err) => {
                        warn!("position sync failed: {}", err);
                        CommandResult::from_error(&err)
                    }
                }
            }
            ControllerMessage::OverlayRemoved(removed) => {
                if !self.is_tracked(&removed.url) {
                    return CommandResult::ok("ignored");
                }
                self.remove(&removed.url, &removed.overlay_id);
                CommandResult::ok_empty()
            }
        }
    }

    pub fn handle_message_json(&mut self, json: &str) -> CommandResult {
        match serde_json::from_str::<ControllerMessage>(json) {
            Ok(message) => self.handle_message(message),
            Err(err) => CommandResult::from_error(&OverlayError::InvalidPayload(err.to_string())),
        }
    }

    fn is_tracked(&self, url: &str) -> bool {
        self.current_url.as_deref() == Some(url)
    }

    fn modify(
        &mut self,
        url: &str,
        id: &OverlayId,
        change: impl FnOnce(&mut Overlay),
    ) -> Result<(), OverlayError> {
        let mut overlays = self.store.get(url);
        let overlay = overlays
            .iter_mut()
            .find(|o| &o.id == id)
            .ok_or_else(|| OverlayError::NotFound(id.clone()))?;
        change(overlay);
        self.store.set(url, overlays);
        Ok(())
    }
}

/// Deliver one command and turn the outcome into a user-facing message.
pub fn send<L: AgentLink>(link: &mut L, command: &Command) -> Notice {
    Notice::from_delivery(&link.deliver(command))
}

/// Toast text for the popup.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Notice {
    pub success: bool,
    pub message: String,
}

impl Notice {
    pub fn from_delivery(result: &Result<CommandResult, OverlayError>) -> Self {
        match result {
            Ok(result) if result.success => Notice {
                success: true,
                message: result
                    .data
                    .as_ref()
                    .and_then(|d| d.as_str().or_else(|| d["message"].as_str()))
                    .unwrap_or("Done")
                    .to_string(),
            },
            Ok(result) => Notice {
                success: false,
                message: format!(
                    "The page rejected the change: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                ),
            },
            Err(err) => Notice {
                success: false,
                message: describe_failure(err),
            },
        }
    }
}

pub fn describe_failure(err: &OverlayError) -> String {
    match err {
        OverlayError::AgentUnavailable(_) => {
            "The overlay tool is not running on this page. Reload the page and try again."
                .to_string()
        }
        OverlayError::NotFound(_) => "That overlay no longer exists on the page.".to_string(),
        OverlayError::DuplicateId(_) => "That overlay is already on the page.".to_string(),
        OverlayError::InvalidPayload(message) => format!("Invalid overlay data: {}", message),
        other => other.to_string(),
    }
}

// =============================================================================
// WASM Bindings
// =============================================================================

/// Popup-side controller exposed to JavaScript. JSON in, JSON out.
/// Persistence goes through `snapshot`/`restore` so the shell can use chrome.storage.
#[wasm_bindgen]
pub struct WasmOverlayController {
    inner: OverlayController<MemoryStore>,
    validator: BasicImageValidator,
    ids: UuidIds,
}

#[wasm_bindgen]
impl WasmOverlayController {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<WasmOverlayController, JsValue> {
        let config: ControllerConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid controller config: {}", e)))?;
        Ok(WasmOverlayController {
            validator: BasicImageValidator::new(config.max_upload_bytes),
            ids: UuidIds::new(config.id_prefix.clone()),
            inner: OverlayController::new(config, MemoryStore::default()),
        })
    }

    pub fn track_page(&mut self, url: &str) {
        self.inner.track_page(url);
    }

    /// Load persisted records (JSON array of overlays) for a page.
    pub fn restore(&mut self, url: &str, overlays_json: &str) -> Result<(), JsValue> {
        let overlays: Vec<Overlay> = serde_json::from_str(overlays_json).map_err(to_js)?;
        self.inner.store_mut().set(url, overlays);
        Ok(())
    }

    pub fn snapshot(&self, url: &str) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.overlays(url)).map_err(to_js)
    }

    /// Returns a JSON array of commands to send to the page.
    pub fn upload(&mut self, url: &str, upload_json: &str) -> Result<String, JsValue> {
        let upload: ImageUpload = serde_json::from_str(upload_json).map_err(to_js)?;
        let commands = self
            .inner
            .upload(url, upload, &self.validator, &mut self.ids)
            .map_err(|e| JsValue::from_str(&describe_failure(&e)))?;
        serde_json::to_string(&commands).map_err(to_js)
    }

    pub fn update(&mut self, url: &str, id: &str, patch_json: &str) -> Result<String, JsValue> {
        let patch: OverlayPatch = serde_json::from_str(patch_json).map_err(to_js)?;
        let command = self
            .inner
            .update(url, &OverlayId::from(id), patch)
            .map_err(|e| JsValue::from_str(&describe_failure(&e)))?;
        serde_json::to_string(&command).map_err(to_js)
    }

    pub fn remove(&mut self, url: &str, id: &str) -> Result<String, JsValue> {
        let command = self.inner.remove(url, &OverlayId::from(id));
        serde_json::to_string(&command).map_err(to_js)
    }

    pub fn toggle_visibility(&mut self, url: &str, id: &str) -> Result<String, JsValue> {
        let command = self
            .inner
            .toggle_visibility(url, &OverlayId::from(id))
            .map_err(|e| JsValue::from_str(&describe_failure(&e)))?;
        serde_json::to_string(&command).map_err(to_js)
    }

    pub fn clear(&mut self, url: &str) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.clear(url)).map_err(to_js)
    }

    /// Handle a page-agent message; always returns a `{success, data?, error?}` JSON string.
    pub fn handle_message(&mut self, message_json: &str) -> String {
        let result = self.inner.handle_message_json(message_json);
        serde_json::to_string(&result)
            .unwrap_or_else(|_| r#"{"success":false,"error":"serialization failed"}"#.to_string())
    }

    /// Turn a delivered `{success, data?, error?}` JSON into toast text.
    pub fn describe_result(result_json: &str) -> String {
        let delivery = serde_json::from_str::<CommandResult>(result_json)
            .map_err(|e| OverlayError::InvalidPayload(e.to_string()));
        Notice::from_delivery(&delivery).message
    }
}

fn to_js(err: serde_json::Error) -> JsValue {
    JsValue::from_str(&OverlayError::from(err).to_string())
}
