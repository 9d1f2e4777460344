//! Cross-service album identity
//!
//! Spotify album ids change when label or metadata corrections are
//! published, so albums are matched on normalized title and primary artist.

use serde::Serialize;
use std::fmt;

use crate::library::Album;

/// Normalized `title|primary artist` key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AlbumIdentityKey(String);

impl AlbumIdentityKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlbumIdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the identity key for an album
pub fn identity_key(album: &Album) -> AlbumIdentityKey {
    AlbumIdentityKey(format!(
        "{}|{}",
        normalize(&album.name),
        normalize(&album.primary_artist)
    ))
}

impl Album {
    pub fn identity_key(&self) -> AlbumIdentityKey {
        identity_key(self)
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
