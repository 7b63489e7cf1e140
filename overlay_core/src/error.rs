// Typed errors with thiserror. Messages cross the message boundary verbatim.

use thiserror::Error;

use crate::types::OverlayId;

/// Overlay core error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OverlayError {
    #[error("Overlay not found: {0}")]
    NotFound(OverlayId),

    #[error("Overlay already exists: {0}")]
    DuplicateId(OverlayId),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Overlay agent not available: {0}")]
    AgentUnavailable(String),

    #[error("Gave up waiting for the document body after {attempts} attempts")]
    ReadinessGaveUp { attempts: u32 },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for OverlayError {
    fn from(err: serde_json::Error) -> Self {
        OverlayError::Serialization(err.to_string())
    }
}
