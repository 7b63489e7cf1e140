// overlay_core: design-overlay engine for the browser extension.
// Geometry, state and protocol live here. The wasm32-only modules are DOM and chrome.* plumbing.

mod agent;
mod background;
mod config;
mod controller;
mod drag;
mod error;
mod input;
mod menu;
mod protocol;
mod reconciler;
mod registry;
mod renderer;
mod router;
mod shortcuts;
mod style;
mod types;
mod validate;

#[cfg(target_arch = "wasm32")]
mod chrome;
#[cfg(target_arch = "wasm32")]
mod content;
#[cfg(target_arch = "wasm32")]
mod dom;

use wasm_bindgen::prelude::*;

pub use agent::{AgentOutput, PageAgent};
pub use background::{AgentLink, Coordinator, TabId};
pub use config::{AgentConfig, ControllerConfig};
pub use controller::{describe_failure, send, MemoryStore, Notice, OverlayController, OverlayStore, WasmOverlayController};
pub use drag::{DragController, DragEnd, DragRejected, DragSession};
pub use error::OverlayError;
pub use input::InputEvent;
pub use menu::{MenuAction, MenuOutcome};
pub use protocol::{
    AgentNotice, Command, CommandResult, ControllerMessage, IdPayload, LoadConfigRequest,
    LoadConfigResponse, OverlayRemoved, PositionChanged, TabMessage, UpdatePayload,
};
pub use reconciler::{PageReconciler, PollStep, ReadinessPoll, SettleTicket};
pub use registry::OverlayRegistry;
pub use renderer::Renderer;
pub use router::{dispatch, dispatch_json};
pub use shortcuts::{KeyChord, ShortcutAction, Shortcuts};
pub use style::{compute_menu_anchor, compute_overlay_box, BoxStyle, MenuAnchor};
pub use types::*;
pub use validate::{BasicImageValidator, IdGenerator, ImageUpload, ImageValidator, UuidIds};

/// Panic hook and console logging. Runs once when the module is instantiated.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// Content-script entry point. Returns once the agent is scheduled; setup failures are logged.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn start_page_agent(config_json: &str) -> Result<(), JsValue> {
    let config = parse_agent_config(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    content::start(config);
    Ok(())
}

/// Background entry point: deliver one command or notice JSON to a tab and return the
/// result JSON. A tab without an agent yields a failed result instead of a rejection.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub async fn forward_to_tab(tab_id: u32, message_json: String) -> Result<String, JsValue> {
    let result = match serde_json::from_str::<TabMessage>(&message_json) {
        Ok(message) => deliver_to_tab(tab_id, &message).await,
        Err(err) => CommandResult::from_error(&OverlayError::InvalidPayload(err.to_string())),
    };
    result_json(&result)
}

/// Background entry point for `tabs.onUpdated`: SPA route changes made with
/// `history.pushState` are only visible from here.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub async fn notify_navigation(tab_id: u32, url: String) -> Result<String, JsValue> {
    let message = TabMessage::Notice(AgentNotice::PageNavigated { url });
    result_json(&deliver_to_tab(tab_id, &message).await)
}

#[cfg(target_arch = "wasm32")]
async fn deliver_to_tab(tab_id: u32, message: &TabMessage) -> CommandResult {
    match chrome::send_to_tab(tab_id, message).await {
        Ok(result) => result,
        Err(err) => CommandResult::from_error(&err),
    }
}

#[cfg(target_arch = "wasm32")]
fn result_json(result: &CommandResult) -> Result<String, JsValue> {
    serde_json::to_string(result)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Empty input means defaults.
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
fn parse_agent_config(config_json: &str) -> Result<AgentConfig, OverlayError> {
    if config_json.trim().is_empty() {
        return Ok(AgentConfig::default());
    }
    Ok(serde_json::from_str(config_json)?)
}
