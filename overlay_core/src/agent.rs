// Page agent: one explicitly constructed instance per page. Composes the registry,
// drag controller, menus, shortcuts, reconciler and router over one renderer.

use log::{debug, info, warn};

use crate::background::AgentLink;
use crate::config::AgentConfig;
use crate::drag::DragController;
use crate::error::OverlayError;
use crate::input::InputEvent;
use crate::menu::{self, MenuOutcome};
use crate::protocol::{
    AgentNotice, Command, CommandResult, ControllerMessage, OverlayRemoved, PositionChanged,
};
use crate::reconciler::{PageReconciler, SettleTicket};
use crate::registry::OverlayRegistry;
use crate::renderer::Renderer;
use crate::router;
use crate::shortcuts::{self, ShortcutAction, Shortcuts};
use crate::types::{Overlay, OverlayId, OverlayPatch};

/// Side effects the host shell must carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput {
    /// Send to the controlling UI, fire-and-forget.
    Notify(ControllerMessage),
    /// Show a blocking alert in the page (resize validation).
    Alert(String),
}

pub struct PageAgent<R: Renderer> {
    registry: OverlayRegistry<R>,
    drag: DragController,
    reconciler: PageReconciler,
    shortcuts: Shortcuts,
}

impl<R: Renderer> PageAgent<R> {
    pub fn new(renderer: R, config: &AgentConfig, url: impl Into<String>) -> Result<Self, OverlayError> {
        let shortcuts = Shortcuts::new(&config.toggle_all_shortcut, &config.hide_all_key)?;
        let url = url.into();
        info!("page agent started for {}", url);
        Ok(PageAgent {
            registry: OverlayRegistry::with_menu_inset(renderer, config.menu_inset),
            drag: DragController::new(),
            reconciler: PageReconciler::new(url, config.navigation_settle_ms),
            shortcuts,
        })
    }

    pub fn url(&self) -> &str {
        self.reconciler.url()
    }

    pub fn registry(&self) -> &OverlayRegistry<R> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut OverlayRegistry<R> {
        &mut self.registry
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn handle_command(&mut self, command: Command) -> CommandResult {
        let freezing = match &command {
            Command::UpdateOverlay(payload) if payload.updates.locked == Some(true) => {
                Some(payload.id.clone())
            }
            _ => None,
        };
        let result = router::dispatch(&mut self.registry, command);
        if let (true, Some(id)) = (result.success, freezing) {
            self.drag.cancel_for(&id);
        }
        result
    }

    pub fn handle_command_json(&mut self, json: &str) -> CommandResult {
        match serde_json::from_str::<Command>(json) {
            Ok(command) => self.handle_command(command),
            Err(_) => router::dispatch_json(&mut self.registry, json),
        }
    }

    pub fn handle_input(&mut self, event: InputEvent) -> Vec<AgentOutput> {
        match event {
            InputEvent::PointerDown { overlay_id, x, y } => {
                if let Err(reason) = self.drag.pointer_down(&self.registry, &overlay_id, (x, y)) {
                    debug!("drag on {} rejected: {:?}", overlay_id, reason);
                }
                Vec::new()
            }
            InputEvent::PointerMove { x, y } => {
                self.drag.pointer_move(&mut self.registry, (x, y));
                Vec::new()
            }
            InputEvent::PointerUp { .. } | InputEvent::PointerCancel => match self.drag.pointer_up(&self.registry) {
                Some(end) => match end.position {
                    Some(position) => {
                        vec![self.changed(end.overlay_id, OverlayPatch::position(position))]
                    }
                    None => Vec::new(),
                },
                None => Vec::new(),
            },
            InputEvent::KeyDown { chord, editable } => {
                if editable {
                    return Vec::new();
                }
                let (visible, changed) = match self.shortcuts.resolve(&chord) {
                    Some(ShortcutAction::ToggleAll) => shortcuts::toggle_all(&mut self.registry),
                    Some(ShortcutAction::HideAll) => (false, shortcuts::hide_all(&mut self.registry)),
                    None => return Vec::new(),
                };
                changed
                    .into_iter()
                    .map(|id| self.changed(id, OverlayPatch::visible(visible)))
                    .collect()
            }
            InputEvent::MenuToggle { overlay_id } => {
                if let Err(err) = menu::toggle_open(&mut self.registry, &overlay_id) {
                    warn!("menu toggle ignored: {}", err);
                }
                Vec::new()
            }
            InputEvent::MenuAction { overlay_id, action } => {
                match menu::apply_action(&mut self.registry, &overlay_id, &action) {
                    Ok(MenuOutcome::Updated(patch)) => {
                        if patch.locked == Some(true) {
                            self.drag.cancel_for(&overlay_id);
                        }
                        vec![self.changed(overlay_id, patch)]
                    }
                    Ok(MenuOutcome::Deleted) => {
                        vec![AgentOutput::Notify(ControllerMessage::OverlayRemoved(OverlayRemoved {
                            url: self.url().to_string(),
                            overlay_id,
                        }))]
                    }
                    Err(OverlayError::InvalidPayload(message)) => vec![AgentOutput::Alert(message)],
                    Err(err) => {
                        warn!("menu action ignored: {}", err);
                        Vec::new()
                    }
                }
            }
            InputEvent::DocumentClick => {
                menu::close_all(&mut self.registry);
                Vec::new()
            }
        }
    }

    pub fn on_mutation(&mut self) -> usize {
        self.reconciler.on_mutation(&mut self.registry)
    }

    pub fn on_navigation(&mut self, url: &str) -> Option<SettleTicket> {
        let ticket = self.reconciler.on_navigation(url)?;
        self.drag.cancel();
        Some(ticket)
    }

    /// Notices pushed by the background. Navigation covers `history.pushState`,
    /// which raises no event inside the page.
    pub fn handle_notice(&mut self, notice: AgentNotice) -> Option<SettleTicket> {
        match notice {
            AgentNotice::PageNavigated { url } => self.on_navigation(&url),
        }
    }

    /// Returns the LOAD_CONFIG request to send once the page has settled.
    pub fn on_settled(&mut self, ticket: &SettleTicket) -> Option<ControllerMessage> {
        self.reconciler
            .on_settled(ticket, &mut self.registry)
            .map(ControllerMessage::LoadConfig)
    }

    pub fn load_config_request(&self) -> ControllerMessage {
        ControllerMessage::LoadConfig(crate::protocol::LoadConfigRequest {
            url: self.url().to_string(),
        })
    }

    /// Rebuild from persisted records. Responses for another URL are dropped.
    pub fn hydrate(&mut self, url: &str, overlays: Vec<Overlay>) -> usize {
        if url != self.url() {
            debug!("dropping overlays for {} (now on {})", url, self.url());
            return 0;
        }
        let mut created = 0;
        for overlay in overlays {
            if self.registry.contains(&overlay.id) {
                self.registry.remove(&overlay.id);
            }
            match self.registry.create(overlay) {
                Ok(_) => created += 1,
                Err(err) => warn!("skipping persisted overlay: {}", err),
            }
        }
        created
    }

    fn changed(&self, overlay_id: OverlayId, updates: OverlayPatch) -> AgentOutput {
        AgentOutput::Notify(ControllerMessage::OverlayPositionChanged(PositionChanged {
            url: self.url().to_string(),
            overlay_id,
            updates,
        }))
    }
}

impl<R: Renderer> AgentLink for PageAgent<R> {
    fn deliver(&mut self, command: &Command) -> Result<CommandResult, OverlayError> {
        Ok(self.handle_command(command.clone()))
    }

    fn notify(&mut self, notice: &AgentNotice) -> Result<CommandResult, OverlayError> {
        Ok(match self.handle_notice(notice.clone()) {
            Some(ticket) => CommandResult::ok(format!(
                "Reloading overlays for {} in {}ms",
                ticket.url, ticket.delay_ms
            )),
            None => CommandResult::ok("Already on this page"),
        })
    }
}
