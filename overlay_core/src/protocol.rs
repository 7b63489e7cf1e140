// Message protocol between controlling UI, background coordinator and page agents.
// Every message is `{ "type": "...", "payload": ... }`; responses are `{success, data?, error?}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OverlayError;
use crate::types::{Overlay, OverlayId, OverlayPatch};

/// Commands a page agent accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    CreateOverlay(Overlay),
    UpdateOverlay(UpdatePayload),
    RemoveOverlay(IdPayload),
    ToggleOverlayVisibility(IdPayload),
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::CreateOverlay(_) => "CREATE_OVERLAY",
            Command::UpdateOverlay(_) => "UPDATE_OVERLAY",
            Command::RemoveOverlay(_) => "REMOVE_OVERLAY",
            Command::ToggleOverlayVisibility(_) => "TOGGLE_OVERLAY_VISIBILITY",
        }
    }

    pub fn overlay_id(&self) -> &OverlayId {
        match self {
            Command::CreateOverlay(overlay) => &overlay.id,
            Command::UpdateOverlay(payload) => &payload.id,
            Command::RemoveOverlay(payload) | Command::ToggleOverlayVisibility(payload) => {
                &payload.id
            }
        }
    }

    pub fn remove(id: OverlayId) -> Self {
        Command::RemoveOverlay(IdPayload { id })
    }

    pub fn toggle(id: OverlayId) -> Self {
        Command::ToggleOverlayVisibility(IdPayload { id })
    }

    pub fn update(id: OverlayId, updates: OverlayPatch) -> Self {
        Command::UpdateOverlay(UpdatePayload { id, updates })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub id: OverlayId,
    pub updates: OverlayPatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdPayload {
    pub id: OverlayId,
}

/// Response envelope for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub fn ok(data: impl Into<Value>) -> Self {
        CommandResult {
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    pub fn ok_empty() -> Self {
        CommandResult {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        CommandResult {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn from_error(err: &OverlayError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Messages a page agent sends to the controlling UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerMessage {
    LoadConfig(LoadConfigRequest),
    OverlayPositionChanged(PositionChanged),
    OverlayRemoved(OverlayRemoved),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadConfigRequest {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LoadConfigResponse {
    pub overlays: Vec<Overlay>,
}

/// Fire-and-forget sync of a locally made change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionChanged {
    pub url: String,
    pub overlay_id: OverlayId,
    pub updates: OverlayPatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayRemoved {
    pub url: String,
    pub overlay_id: OverlayId,
}

/// Notices the background coordinator pushes to a page agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentNotice {
    PageNavigated { url: String },
}

/// Anything the background may push into a tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TabMessage {
    Command(Command),
    Notice(AgentNotice),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;

    #[test]
    fn command_wire_format() {
        let json = r#"{"type":"UPDATE_OVERLAY","payload":{"id":"A","updates":{"position":{"x":5,"y":6}}}}"#;
        let command: Command = serde_json::from_str(json).unwrap();
        assert_eq!(
            command,
            Command::update(OverlayId::from("A"), OverlayPatch::position(Position::new(5, 6)))
        );
        assert_eq!(command.kind(), "UPDATE_OVERLAY");

        let toggle = serde_json::to_string(&Command::toggle(OverlayId::from("B"))).unwrap();
        assert_eq!(toggle, r#"{"type":"TOGGLE_OVERLAY_VISIBILITY","payload":{"id":"B"}}"#);
    }

    #[test]
    fn result_omits_absent_fields() {
        let json = serde_json::to_string(&CommandResult::failure("nope")).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"nope"}"#);
    }

    #[test]
    fn position_changed_wire_format() {
        let message = ControllerMessage::OverlayPositionChanged(PositionChanged {
            url: "https://example.com/".to_string(),
            overlay_id: OverlayId::from("A"),
            updates: OverlayPatch::position(Position::new(1, 2)),
        });
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.starts_with(r#"{"type":"OVERLAY_POSITION_CHANGED""#));
        assert!(json.contains(r#""overlayId":"A""#));
    }

    #[test]
    fn tab_message_accepts_commands_and_notices() {
        let command: TabMessage =
            serde_json::from_str(r#"{"type":"REMOVE_OVERLAY","payload":{"id":"A"}}"#).unwrap();
        assert_eq!(command, TabMessage::Command(Command::remove(OverlayId::from("A"))));

        let notice: TabMessage =
            serde_json::from_str(r#"{"type":"PAGE_NAVIGATED","payload":{"url":"https://a/b"}}"#)
                .unwrap();
        assert_eq!(
            notice,
            TabMessage::Notice(AgentNotice::PageNavigated {
                url: "https://a/b".to_string()
            })
        );
        let round_trip = serde_json::to_string(&notice).unwrap();
        assert_eq!(round_trip, r#"{"type":"PAGE_NAVIGATED","payload":{"url":"https://a/b"}}"#);

        assert!(serde_json::from_str::<TabMessage>(r#"{"type":"EXPLODE"}"#).is_err());
    }

    #[test]
    fn navigation_notice_parses() {
        let notice: AgentNotice =
            serde_json::from_str(r#"{"type":"PAGE_NAVIGATED","payload":{"url":"https://a/"}}"#)
                .unwrap();
        assert_eq!(
            notice,
            AgentNotice::PageNavigated {
                url: "https://a/".to_string()
            }
        );
    }
}
