// Thin bridge to the extension messaging API (wasm32 only). Values cross as JSON text.

use js_sys::{Function, Promise, Reflect, JSON};
use log::debug;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::error::OverlayError;
use crate::protocol::CommandResult;

/// Walks `globalThis.chrome.<path>`.
fn namespace(path: &[&str]) -> Result<JsValue, OverlayError> {
    let mut value: JsValue = js_sys::global().into();
    for key in std::iter::once(&"chrome").chain(path.iter()) {
        value = Reflect::get(&value, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED);
        if value.is_undefined() || value.is_null() {
            return Err(OverlayError::AgentUnavailable(format!(
                "chrome.{} is not available",
                path.join(".")
            )));
        }
    }
    Ok(value)
}

fn method(target: &JsValue, name: &str) -> Result<Function, OverlayError> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
        .ok_or_else(|| OverlayError::AgentUnavailable(format!("{} is not a function", name)))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, OverlayError> {
    let json = serde_json::to_string(value)?;
    JSON::parse(&json).map_err(|err| OverlayError::Serialization(format!("{:?}", err)))
}

pub(crate) fn stringify(value: &JsValue) -> Option<String> {
    JSON::stringify(value).ok().map(String::from)
}

fn rejection(err: JsValue) -> OverlayError {
    let message = Reflect::get(&err, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", err));
    OverlayError::AgentUnavailable(message)
}

async fn call(target: &JsValue, name: &str, args: &[JsValue]) -> Result<JsValue, OverlayError> {
    let function = method(target, name)?;
    let array: js_sys::Array = args.iter().collect();
    let returned = function.apply(target, &array).map_err(rejection)?;
    let promise = returned
        .dyn_into::<Promise>()
        .map_err(|_| OverlayError::AgentUnavailable(format!("{} did not return a promise", name)))?;
    JsFuture::from(promise).await.map_err(rejection)
}

/// `chrome.runtime.sendMessage`. Returns the raw JSON of the reply, if any.
pub async fn send_runtime_message<T: Serialize>(message: &T) -> Result<Option<String>, OverlayError> {
    let runtime = namespace(&["runtime"])?;
    let reply = call(&runtime, "sendMessage", &[to_js(message)?]).await?;
    if reply.is_undefined() || reply.is_null() {
        return Ok(None);
    }
    Ok(stringify(&reply))
}

/// `chrome.tabs.sendMessage`. A missing receiver maps to AgentUnavailable.
pub async fn send_to_tab<T: Serialize>(tab_id: u32, message: &T) -> Result<CommandResult, OverlayError> {
    let tabs = namespace(&["tabs"])?;
    debug!("message -> tab {}", tab_id);
    let reply = call(&tabs, "sendMessage", &[JsValue::from(tab_id), to_js(message)?]).await?;
    let json = stringify(&reply).ok_or_else(|| {
        OverlayError::AgentUnavailable(format!("tab {} sent no response", tab_id))
    })?;
    Ok(serde_json::from_str(&json)?)
}

/// Registers a `chrome.runtime.onMessage` listener. The handler receives the message as
/// JSON and returns the JSON reply, or `None` when the message is not addressed to it.
pub fn on_message(
    mut handler: impl FnMut(String) -> Option<String> + 'static,
) -> Result<(), OverlayError> {
    let on_message = namespace(&["runtime", "onMessage"])?;
    let listener = Closure::wrap(Box::new(
        move |message: JsValue, _sender: JsValue, send_response: JsValue| -> bool {
            let Some(json) = stringify(&message) else {
                return false;
            };
            let Some(reply) = handler(json) else {
                return false;
            };
            if let (Ok(reply), Ok(respond)) = (JSON::parse(&reply), send_response.dyn_into::<Function>()) {
                let _ = respond.call1(&JsValue::NULL, &reply);
            }
            false
        },
    ) as Box<dyn FnMut(JsValue, JsValue, JsValue) -> bool>);

    let add = method(&on_message, "addListener")?;
    add.call1(&on_message, listener.as_ref().unchecked_ref())
        .map_err(rejection)?;
    // The listener lives as long as the page.
    listener.forget();
    Ok(())
}
