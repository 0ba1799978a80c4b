//! Domain state for the design studio: image records, edit records, and the
//! history state machine, persisted as a single JSON snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod history;
pub mod store;

pub use history::StudioState;

pub const SCHEMA_VERSION: u32 = 1;

/// Click anchor for a localized edit, in percent of the displayed image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOrigin {
    /// Uploaded by the user; the root of the history.
    Original,
    /// Produced by the generative API from a parent record.
    Generated,
}

/// One image in the studio. Immutable once created; edits supersede a record
/// by creating a new one that points back via `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: Uuid,
    /// Full-resolution image as a `data:image/...;base64,...` URL.
    pub data_url: String,
    /// Small square preview for the history strip, also a data URL.
    #[serde(default)]
    pub thumbnail: Option<String>,
    pub origin: ImageOrigin,
    /// Short display caption derived from the prompt.
    #[serde(default)]
    pub caption: Option<String>,
    /// The prompt exactly as the user typed it.
    #[serde(default)]
    pub original_prompt: Option<String>,
    #[serde(default)]
    pub spot: Option<SpotPoint>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    pub fn original(data_url: String, thumbnail: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            data_url,
            thumbnail,
            origin: ImageOrigin::Original,
            caption: None,
            original_prompt: None,
            spot: None,
            parent_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_original(&self) -> bool {
        self.origin == ImageOrigin::Original
    }

    /// The raw base64 payload of `data_url`, if it is a data URL.
    pub fn base64_payload(&self) -> Option<&str> {
        self.data_url.split_once(',').map(|(_, b64)| b64)
    }
}

/// One applied edit, linking a source image to the image it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRecord {
    pub id: Uuid,
    pub prompt: String,
    pub from_image: Uuid,
    pub to_image: Uuid,
    #[serde(default)]
    pub spot: Option<SpotPoint>,
    pub created_at: DateTime<Utc>,
}
