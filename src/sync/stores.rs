//! Library collaborators the sync engine reads from and writes to

use anyhow::Result;
use async_trait::async_trait;

use crate::library::Album;

/// The user's local album library
#[async_trait]
pub trait LocalLibraryStore: Send + Sync {
    /// Albums currently in the library
    async fn get_all_albums_in_library(&self) -> Result<Vec<Album>>;

    /// Persist the album record if no record with its id exists yet
    ///
    /// Does not make the album part of the library.
    async fn save_album_if_not_present(&self, album: &Album) -> Result<()>;

    /// Mark a stored album as part of the library
    async fn add_album_to_library(&self, album_id: &str) -> Result<()>;

    async fn remove_album_from_library(&self, album_id: &str) -> Result<()>;
}

/// The user's saved albums on the remote service
#[async_trait]
pub trait RemoteLibraryStore: Send + Sync {
    async fn fetch_saved_albums(&self) -> Result<Vec<Album>>;

    /// Save a batch of albums; implementations split it to fit request limits
    async fn add_albums_to_remote_library(&self, albums: &[Album]) -> Result<()>;

    /// Remove a batch of albums; implementations split it to fit request limits
    async fn remove_albums_from_remote_library(&self, albums: &[Album]) -> Result<()>;
}
