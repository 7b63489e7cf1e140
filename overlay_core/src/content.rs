// Content-script bootstrap (wasm32 only): waits for the body, wires browser events into
// the page agent and carries out its outputs.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Function, Promise};
use log::{debug, error, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{Document, Event, HtmlElement, KeyboardEvent, MutationObserver, MutationObserverInit, PointerEvent, Window};

use crate::agent::{AgentOutput, PageAgent};
use crate::chrome;
use crate::config::AgentConfig;
use crate::dom::{emit, js_err, DomRenderer, InputSink};
use crate::error::OverlayError;
use crate::input::InputEvent;
use crate::protocol::{AgentNotice, CommandResult, ControllerMessage, LoadConfigResponse, TabMessage};
use crate::reconciler::{PollStep, ReadinessPoll};
use crate::shortcuts::KeyChord;

type Agent = Rc<RefCell<PageAgent<DomRenderer>>>;

pub fn start(config: AgentConfig) {
    spawn_local(async move {
        if let Err(err) = run(config).await {
            error!("overlay agent failed to start: {}", err);
        }
    });
}

async fn run(config: AgentConfig) -> Result<(), OverlayError> {
    let window = web_sys::window().ok_or_else(|| OverlayError::Render("no window".to_string()))?;
    let document = window
        .document()
        .ok_or_else(|| OverlayError::Render("no document".to_string()))?;

    wait_for_body(&window, &document, &config).await?;

    let url = window.location().href().map_err(|e| js_err("read location", e))?;
    let sink: InputSink = Rc::new(RefCell::new(None));
    let renderer = DomRenderer::new(document.clone(), Rc::clone(&sink));
    let agent: Agent = Rc::new(RefCell::new(PageAgent::new(renderer, &config, url)?));

    {
        let agent = Rc::clone(&agent);
        let window = window.clone();
        *sink.borrow_mut() = Some(Box::new(move |event: InputEvent| {
            let outputs = agent.borrow_mut().handle_input(event);
            carry_out(&window, outputs);
        }));
    }

    install_input_listeners(&document, &sink)?;
    let sink_blur = Rc::clone(&sink);
    listen(&window, "blur", move |_event: Event| {
        emit(&sink_blur, InputEvent::PointerCancel);
    })?;
    install_mutation_observer(&document, &agent)?;
    install_navigation_listeners(&window, &agent)?;
    install_message_listener(&window, &agent)?;

    request_overlays(Rc::clone(&agent)).await;
    info!("overlay agent ready");
    Ok(())
}

async fn sleep(window: &Window, ms: u32) -> Result<(), OverlayError> {
    let mut scheduled = Ok(0);
    let promise = Promise::new(&mut |resolve: Function, _reject: Function| {
        scheduled = window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms as i32);
    });
    scheduled.map_err(|e| js_err("setTimeout", e))?;
    JsFuture::from(promise)
        .await
        .map_err(|e| js_err("timer", e))?;
    Ok(())
}

async fn wait_for_body(window: &Window, document: &Document, config: &AgentConfig) -> Result<(), OverlayError> {
    let mut poll = ReadinessPoll::new(config.readiness_poll_interval_ms, config.readiness_max_attempts);
    loop {
        match poll.check(document.body().is_some())? {
            PollStep::Ready => {
                debug!("document body ready after {} checks", poll.attempts());
                return Ok(());
            }
            PollStep::RetryAfter(ms) => sleep(window, ms).await?,
        }
    }
}

fn carry_out(window: &Window, outputs: Vec<AgentOutput>) {
    for output in outputs {
        match output {
            AgentOutput::Notify(message) => notify(message),
            AgentOutput::Alert(message) => {
                if let Err(err) = window.alert_with_message(&message) {
                    warn!("alert failed: {:?}", err);
                }
            }
        }
    }
}

fn notify(message: ControllerMessage) {
    spawn_local(async move {
        if let Err(err) = chrome::send_runtime_message(&message).await {
            debug!("notification not delivered: {}", err);
        }
    });
}

fn listen<E: JsCast + 'static>(
    target: &web_sys::EventTarget,
    kind: &str,
    handler: impl FnMut(E) + 'static,
) -> Result<(), OverlayError> {
    let mut handler = handler;
    let closure = Closure::wrap(Box::new(move |event: Event| {
        if let Ok(event) = event.dyn_into::<E>() {
            handler(event);
        }
    }) as Box<dyn FnMut(Event)>);
    target
        .add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())
        .map_err(|e| js_err(kind, e))?;
    closure.forget();
    Ok(())
}

fn is_editable(document: &Document) -> bool {
    let Some(active) = document.active_element() else {
        return false;
    };
    match active.tag_name().to_ascii_uppercase().as_str() {
        "INPUT" | "TEXTAREA" | "SELECT" => true,
        _ => active
            .dyn_into::<HtmlElement>()
            .map(|el| el.is_content_editable())
            .unwrap_or(false),
    }
}

fn install_input_listeners(document: &Document, sink: &InputSink) -> Result<(), OverlayError> {
    let sink_move = Rc::clone(sink);
    listen(document, "pointermove", move |event: PointerEvent| {
        emit(
            &sink_move,
            InputEvent::PointerMove {
                x: event.client_x(),
                y: event.client_y(),
            },
        );
    })?;

    let sink_up = Rc::clone(sink);
    listen(document, "pointerup", move |event: PointerEvent| {
        emit(
            &sink_up,
            InputEvent::PointerUp {
                x: event.client_x(),
                y: event.client_y(),
            },
        );
    })?;

    let sink_cancel = Rc::clone(sink);
    listen(document, "pointercancel", move |_event: Event| {
        emit(&sink_cancel, InputEvent::PointerCancel);
    })?;

    let sink_key = Rc::clone(sink);
    let focus = document.clone();
    listen(document, "keydown", move |event: KeyboardEvent| {
        let chord = KeyChord {
            key: event.key(),
            ctrl: event.ctrl_key(),
            shift: event.shift_key(),
            alt: event.alt_key(),
            meta: event.meta_key(),
        };
        emit(
            &sink_key,
            InputEvent::KeyDown {
                chord,
                editable: is_editable(&focus),
            },
        );
    })?;

    let sink_click = Rc::clone(sink);
    listen(document, "click", move |_event: Event| {
        emit(&sink_click, InputEvent::DocumentClick);
    })
}

fn install_mutation_observer(document: &Document, agent: &Agent) -> Result<(), OverlayError> {
    let body = document
        .body()
        .ok_or_else(|| OverlayError::Render("document has no body".to_string()))?;
    let agent = Rc::clone(agent);
    let callback = Closure::wrap(Box::new(move |_records: JsValue, _observer: JsValue| {
        let Ok(mut agent) = agent.try_borrow_mut() else {
            return;
        };
        let restored = agent.on_mutation();
        if restored > 0 {
            debug!("reattached {} overlay node(s)", restored);
        }
    }) as Box<dyn FnMut(JsValue, JsValue)>);

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())
        .map_err(|e| js_err("MutationObserver", e))?;
    let options = MutationObserverInit::new();
    options.set_child_list(true);
    options.set_subtree(true);
    options.set_attributes(true);
    observer
        .observe_with_options(&body, &options)
        .map_err(|e| js_err("observe body", e))?;
    callback.forget();
    Ok(())
}

fn navigated(window: &Window, agent: &Agent, url: &str) {
    settle_later(window, agent, AgentNotice::PageNavigated { url: url.to_string() });
}

/// Schedules the settle timer for a URL change. The agent ignores stale tickets.
fn settle_later(window: &Window, agent: &Agent, notice: AgentNotice) {
    let Some(ticket) = agent.borrow_mut().handle_notice(notice) else {
        return;
    };
    info!("navigated to {}, settling for {}ms", ticket.url, ticket.delay_ms);
    let delay = ticket.delay_ms as i32;
    let settled_agent = Rc::clone(agent);
    let settle = Closure::once_into_js(move || {
        let request = settled_agent.borrow_mut().on_settled(&ticket);
        if request.is_some() {
            spawn_local(request_overlays(settled_agent));
        }
    });
    if let Err(err) = window.set_timeout_with_callback_and_timeout_and_arguments_0(
        settle.unchecked_ref(),
        delay,
    ) {
        warn!("failed to schedule settle timer: {:?}", err);
    }
}

fn install_navigation_listeners(window: &Window, agent: &Agent) -> Result<(), OverlayError> {
    for kind in ["popstate", "hashchange"] {
        let agent = Rc::clone(agent);
        let handle = window.clone();
        listen(window, kind, move |_event: Event| {
            match handle.location().href() {
                Ok(url) => navigated(&handle, &agent, &url),
                Err(err) => warn!("cannot read location: {:?}", err),
            }
        })?;
    }
    Ok(())
}

fn install_message_listener(window: &Window, agent: &Agent) -> Result<(), OverlayError> {
    let agent = Rc::clone(agent);
    let window = window.clone();
    chrome::on_message(move |json| {
        let result = match serde_json::from_str::<TabMessage>(&json).ok()? {
            TabMessage::Command(command) => {
                debug!("received {}", command.kind());
                agent.borrow_mut().handle_command(command)
            }
            TabMessage::Notice(notice) => {
                settle_later(&window, &agent, notice);
                CommandResult::ok_empty()
            }
        };
        serde_json::to_string(&result).ok()
    })
}

/// Sends LOAD_CONFIG for the current page and hydrates from the reply.
async fn request_overlays(agent: Agent) {
    let request = agent.borrow().load_config_request();
    let ControllerMessage::LoadConfig(ref load) = request else {
        return;
    };
    let url = load.url.clone();

    let reply = match chrome::send_runtime_message(&request).await {
        Ok(Some(reply)) => reply,
        Ok(None) => {
            debug!("no stored overlays for {}", url);
            return;
        }
        Err(err) => {
            warn!("LOAD_CONFIG failed: {}", err);
            return;
        }
    };

    let overlays = match serde_json::from_str::<CommandResult>(&reply) {
        Ok(CommandResult {
            success: true,
            data: Some(data),
            ..
        }) => serde_json::from_value::<LoadConfigResponse>(data).map(|r| r.overlays),
        Ok(result) => {
            debug!("LOAD_CONFIG returned nothing to restore: {:?}", result.error);
            return;
        }
        Err(err) => Err(err),
    };

    match overlays {
        Ok(overlays) => {
            let created = agent.borrow_mut().hydrate(&url, overlays);
            info!("restored {} overlay(s) for {}", created, url);
        }
        Err(err) => warn!("malformed LOAD_CONFIG reply: {}", err),
    }
}
