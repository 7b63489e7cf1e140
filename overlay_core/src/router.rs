// Command router: the single entry point for external commands.
// Nothing escapes as an error; every outcome becomes a CommandResult.

use log::{debug, warn};
use serde_json::json;

use crate::error::OverlayError;
use crate::protocol::{Command, CommandResult};
use crate::registry::OverlayRegistry;
use crate::renderer::Renderer;
use crate::types::OverlayPatch;

/// Parse and dispatch a raw JSON command.
pub fn dispatch_json<R: Renderer>(registry: &mut OverlayRegistry<R>, json: &str) -> CommandResult {
    match serde_json::from_str::<Command>(json) {
        Ok(command) => dispatch(registry, command),
        Err(err) => {
            let err = OverlayError::InvalidPayload(err.to_string());
            warn!("rejected command: {}", err);
            CommandResult::from_error(&err)
        }
    }
}

pub fn dispatch<R: Renderer>(registry: &mut OverlayRegistry<R>, command: Command) -> CommandResult {
    let kind = command.kind();
    match execute(registry, command) {
        Ok(result) => {
            debug!("{} ok", kind);
            result
        }
        Err(err) => {
            warn!("{} failed: {}", kind, err);
            CommandResult::from_error(&err)
        }
    }
}

fn execute<R: Renderer>(
    registry: &mut OverlayRegistry<R>,
    command: Command,
) -> Result<CommandResult, OverlayError> {
    match command {
        Command::CreateOverlay(overlay) => {
            let created = registry.create(overlay)?;
            Ok(CommandResult::ok(format!("Overlay {} created", created.id)))
        }
        Command::UpdateOverlay(payload) => {
            registry.update(&payload.id, &payload.updates)?;
            Ok(CommandResult::ok(format!("Overlay {} updated", payload.id)))
        }
        Command::RemoveOverlay(payload) => {
            let message = match registry.remove(&payload.id) {
                Some(_) => format!("Overlay {} removed", payload.id),
                None => format!("Overlay {} already absent", payload.id),
            };
            Ok(CommandResult::ok(message))
        }
        Command::ToggleOverlayVisibility(payload) => {
            let visible = registry
                .get(&payload.id)
                .map(|o| !o.visible)
                .ok_or_else(|| OverlayError::NotFound(payload.id.clone()))?;
            registry.update(&payload.id, &OverlayPatch::visible(visible))?;
            Ok(CommandResult::ok(json!({
                "message": format!("Overlay {} {}", payload.id, if visible { "shown" } else { "hidden" }),
                "visible": visible,
            })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::testing::{sample_overlay, FakeRenderer};
    use crate::types::{OverlayId, Position, Size};

    fn registry() -> OverlayRegistry<FakeRenderer> {
        OverlayRegistry::new(FakeRenderer::new())
    }

    #[test]
    fn create_then_duplicate() {
        let mut reg = registry();
        let first = dispatch(&mut reg, Command::CreateOverlay(sample_overlay("A")));
        assert!(first.success);

        let second = dispatch(&mut reg, Command::CreateOverlay(sample_overlay("A")));
        assert!(!second.success);
        assert!(second.error.unwrap().contains("already exists"));
    }

    #[test]
    fn update_unknown_is_not_found() {
        let mut reg = registry();
        let result = dispatch(
            &mut reg,
            Command::update(OverlayId::from("A"), OverlayPatch::size(Size::new(1, 1))),
        );
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[test]
    fn update_applies_patch() {
        let mut reg = registry();
        dispatch(&mut reg, Command::CreateOverlay(sample_overlay("A")));
        let result = dispatch(
            &mut reg,
            Command::update(OverlayId::from("A"), OverlayPatch::position(Position::new(3, 4))),
        );
        assert!(result.success);
        assert_eq!(reg.get(&OverlayId::from("A")).unwrap().position, Position::new(3, 4));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut reg = registry();
        dispatch(&mut reg, Command::CreateOverlay(sample_overlay("A")));
        assert!(dispatch(&mut reg, Command::remove(OverlayId::from("A"))).success);
        assert!(dispatch(&mut reg, Command::remove(OverlayId::from("A"))).success);
        assert!(reg.is_empty());
    }

    #[test]
    fn toggle_reports_new_state() {
        let mut reg = registry();
        dispatch(&mut reg, Command::CreateOverlay(sample_overlay("A")));

        let result = dispatch(&mut reg, Command::toggle(OverlayId::from("A")));
        assert!(result.success);
        assert_eq!(result.data.unwrap()["visible"], false);

        let missing = dispatch(&mut reg, Command::toggle(OverlayId::from("Z")));
        assert!(!missing.success);
    }

    #[test]
    fn malformed_json_is_invalid_payload() {
        let mut reg = registry();
        let result = dispatch_json(&mut reg, r#"{"type":"CREATE_OVERLAY","payload":{"id":"A"}}"#);
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Invalid payload"));

        let unknown = dispatch_json(&mut reg, r#"{"type":"EXPLODE","payload":{}}"#);
        assert!(!unknown.success);
    }

    #[test]
    fn zero_size_update_is_rejected_over_the_wire() {
        let mut reg = registry();
        dispatch(&mut reg, Command::CreateOverlay(sample_overlay("A")));
        let result = dispatch_json(
            &mut reg,
            r#"{"type":"UPDATE_OVERLAY","payload":{"id":"A","updates":{"size":{"width":0,"height":5}}}}"#,
        );
        assert!(!result.success);
        assert_eq!(reg.get(&OverlayId::from("A")).unwrap().size, Size::new(300, 200));
    }
}
