// Agent and controller configuration. JSON with per-field defaults, so `{}` is valid.

use serde::{Deserialize, Serialize};

/// Page agent settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Inset of the menu anchor from the overlay's bottom-right corner (px).
    #[serde(default = "default_menu_inset")]
    pub menu_inset: i32,
    /// Delay after a URL change before the registry is rebuilt (ms).
    #[serde(default = "default_navigation_settle_ms")]
    pub navigation_settle_ms: u32,
    /// Interval between "is document.body there yet" checks (ms).
    #[serde(default = "default_readiness_poll_interval_ms")]
    pub readiness_poll_interval_ms: u32,
    /// Ceiling on readiness checks. `None` retries forever.
    #[serde(default)]
    pub readiness_max_attempts: Option<u32>,
    /// Chord that toggles visibility of every overlay.
    #[serde(default = "default_toggle_all_shortcut")]
    pub toggle_all_shortcut: String,
    /// Single key that hides every overlay.
    #[serde(default = "default_hide_all_key")]
    pub hide_all_key: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            menu_inset: default_menu_inset(),
            navigation_settle_ms: default_navigation_settle_ms(),
            readiness_poll_interval_ms: default_readiness_poll_interval_ms(),
            readiness_max_attempts: None,
            toggle_all_shortcut: default_toggle_all_shortcut(),
            hide_all_key: default_hide_all_key(),
        }
    }
}

fn default_menu_inset() -> i32 {
    crate::style::MENU_INSET
}

fn default_navigation_settle_ms() -> u32 {
    500
}

fn default_readiness_poll_interval_ms() -> u32 {
    100
}

fn default_toggle_all_shortcut() -> String {
    "Ctrl+Shift+O".to_string()
}

fn default_hide_all_key() -> String {
    "Escape".to_string()
}

/// Controlling UI settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Clear the page's existing overlays before creating an uploaded one.
    #[serde(default = "default_true")]
    pub replace_on_upload: bool,
    #[serde(default = "default_opacity")]
    pub default_opacity: f64,
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            max_upload_bytes: default_max_upload_bytes(),
            replace_on_upload: true,
            default_opacity: default_opacity(),
            id_prefix: default_id_prefix(),
        }
    }
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024 // 10 MiB
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f64 {
    0.5
}

fn default_id_prefix() -> String {
    "overlay".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let agent: AgentConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(agent, AgentConfig::default());
        assert_eq!(agent.readiness_max_attempts, None);

        let controller: ControllerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(controller, ControllerConfig::default());
        assert!(controller.replace_on_upload);
    }

    #[test]
    fn partial_json_overrides() {
        let agent: AgentConfig =
            serde_json::from_str(r#"{"menu_inset": 12, "readiness_max_attempts": 50}"#).unwrap();
        assert_eq!(agent.menu_inset, 12);
        assert_eq!(agent.readiness_max_attempts, Some(50));
        assert_eq!(agent.navigation_settle_ms, 500);
    }
}
