//! Spotify Web API response models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::library::Album;

/// Offset-based page wrapper used by every list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    /// Absolute URL of the next page, absent on the last one
    pub next: Option<String>,
    pub total: Option<u32>,
}

/// Entry of `GET /v1/me/albums`
#[derive(Debug, Clone, Deserialize)]
pub struct SavedAlbum {
    pub added_at: Option<DateTime<Utc>>,
    pub album: SpotifyAlbum,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyAlbum {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    pub release_date: Option<String>,
    pub total_tracks: Option<u32>,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedArtist {
    pub id: Option<String>,
    pub name: String,
}

/// `GET /v1/me`
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub display_name: Option<String>,
}

impl CurrentUser {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// Body of `PUT` and `DELETE /v1/me/albums`
#[derive(Debug, Clone, Serialize)]
pub struct AlbumIds<'a> {
    pub ids: Vec<&'a str>,
}

/// Error payload returned with non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl From<SavedAlbum> for Album {
    fn from(saved: SavedAlbum) -> Self {
        let SpotifyAlbum {
            id,
            name,
            artists,
            release_date,
            total_tracks,
            uri,
        } = saved.album;

        let artists: Vec<String> = artists.into_iter().map(|a| a.name).collect();
        let primary_artist = artists
            .first()
            .cloned()
            .unwrap_or_else(|| "Unknown Artist".to_string());

        Album {
            id,
            name,
            primary_artist,
            artists,
            release_date,
            total_tracks,
            uri,
            added_at: saved.added_at,
        }
    }
}
