//! Spotify Web API client module

pub mod client;
pub mod models;

pub use client::SpotifyClient;
pub use models::{CurrentUser, SavedAlbum, SpotifyAlbum};

/// Root of the Web API; endpoint paths are joined onto it
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1/";

/// Most album ids accepted by one save or remove request
pub const MAX_IDS_PER_REQUEST: usize = 20;

/// Largest page size for `GET /v1/me/albums`
pub const PAGE_LIMIT: u32 = 50;
