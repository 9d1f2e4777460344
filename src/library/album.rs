//! Album records shared by the local store and the remote service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An album as seen by one of the two libraries
///
/// The `id` is assigned by the remote service and is not stable over time,
/// so reconciliation never matches on it. See [`crate::sync::identity_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(rename = "primaryArtist")]
    pub primary_artist: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(rename = "releaseDate")]
    pub release_date: Option<String>,
    #[serde(rename = "totalTracks")]
    pub total_tracks: Option<u32>,
    pub uri: Option<String>,
    /// When the album was added to the collection it came from
    #[serde(rename = "addedAt")]
    pub added_at: Option<DateTime<Utc>>,
}

impl Album {
    /// Create an album with only the fields reconciliation cares about
    pub fn new(id: &str, name: &str, primary_artist: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            primary_artist: primary_artist.to_string(),
            artists: vec![primary_artist.to_string()],
            release_date: None,
            total_tracks: None,
            uri: None,
            added_at: None,
        }
    }

    /// Set the added-at timestamp
    pub fn added(mut self, at: DateTime<Utc>) -> Self {
        self.added_at = Some(at);
        self
    }

    /// "Artist - Album" label for log lines and CLI output
    pub fn label(&self) -> String {
        format!("{} - {}", self.primary_artist, self.name)
    }
}
