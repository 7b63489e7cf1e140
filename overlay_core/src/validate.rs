// Collaborators consumed by the controlling UI: upload validation and id generation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::OverlayId;

/// An uploaded reference image, already read into a data URL by the popup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpload {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub data_url: String,
    /// Intrinsic dimensions, used as the initial overlay box.
    pub width: u32,
    pub height: u32,
}

/// Returns human-readable problems. Empty means the upload is acceptable.
pub trait ImageValidator {
    fn validate(&self, upload: &ImageUpload) -> Vec<String>;
}

const ACCEPTED_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
    "image/svg+xml",
];

#[derive(Debug, Clone)]
pub struct BasicImageValidator {
    max_bytes: u64,
}

impl BasicImageValidator {
    pub fn new(max_bytes: u64) -> Self {
        BasicImageValidator { max_bytes }
    }
}

impl ImageValidator for BasicImageValidator {
    fn validate(&self, upload: &ImageUpload) -> Vec<String> {
        let mut errors = Vec::new();

        if !ACCEPTED_TYPES.contains(&upload.mime_type.as_str()) {
            errors.push(format!(
                "{}: unsupported file type {:?}",
                upload.name, upload.mime_type
            ));
        }
        if upload.size_bytes > self.max_bytes {
            errors.push(format!(
                "{}: file is {} bytes, the limit is {} bytes",
                upload.name, upload.size_bytes, self.max_bytes
            ));
        }
        if !upload.data_url.starts_with("data:image/") {
            errors.push(format!("{}: image data is not a data URL", upload.name));
        }
        if upload.width == 0 || upload.height == 0 {
            errors.push(format!("{}: image has no dimensions", upload.name));
        }

        errors
    }
}

pub trait IdGenerator {
    fn next_id(&mut self) -> OverlayId;
}

/// `<prefix>-<uuid v4>`. Fresh popup sessions never reissue an id already in storage.
#[derive(Debug, Clone)]
pub struct UuidIds {
    prefix: String,
}

impl UuidIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        UuidIds {
            prefix: prefix.into(),
        }
    }
}

impl IdGenerator for UuidIds {
    fn next_id(&mut self) -> OverlayId {
        OverlayId::new(format!("{}-{}", self.prefix, Uuid::new_v4()))
    }
}
