//! The media record data model.
//!
//! A [`MediaRecord`] is one titled image + audio entry, identified by a
//! stable id shared between the remote collection and the local catalog.
//! The same shape serves both sides: remote documents carry the `imageUrl`
//! and `audioUrl` fields, while the local catalog additionally persists the
//! `localImagePath` and `localAudioPath` fields once media has been fetched.
//!
//! Empty strings are the "unset" sentinel throughout: an empty remote URL
//! means "no remote media of this kind", an empty local path means "not yet
//! fetched locally".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single titled image + audio entry.
///
/// `id` is immutable once assigned and is the sole join key between the
/// remote and local representations. During synchronization, only
/// `local_image_path` and `local_audio_path` may be mutated on a record that
/// already exists locally; everything else is owned by whoever created the
/// record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaRecord {
    /// Stable unique identifier; primary key on both sides.
    pub id: String,

    /// Optional display title (empty when absent).
    pub title: String,

    /// Creation timestamp, set once and immutable afterward.
    ///
    /// Used only for display ordering, never for conflict resolution.
    #[serde(alias = "createDate")]
    pub created_at: DateTime<Utc>,

    /// Remote image locator; empty means "no remote image".
    pub image_url: String,

    /// Remote audio locator; empty means "no remote audio".
    pub audio_url: String,

    /// Local image path; empty means "not yet fetched locally".
    pub local_image_path: String,

    /// Local audio path; empty means "not yet fetched locally".
    pub local_audio_path: String,
}

impl Default for MediaRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            created_at: Utc::now(),
            image_url: String::new(),
            audio_url: String::new(),
            local_image_path: String::new(),
            local_audio_path: String::new(),
        }
    }
}

impl MediaRecord {
    /// Create a new record with the given id and title, timestamped now.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// True if the record references a remote image that has not been
    /// fetched locally yet.
    pub fn wants_image(&self) -> bool {
        self.local_image_path.is_empty() && !self.image_url.is_empty()
    }

    /// True if the record references remote audio that has not been
    /// fetched locally yet.
    pub fn wants_audio(&self) -> bool {
        self.local_audio_path.is_empty() && !self.audio_url.is_empty()
    }
}
