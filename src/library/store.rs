//! JSON-file backed local album library

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::Album;
use crate::sync::LocalLibraryStore;

const LIBRARY_VERSION: u32 = 1;

/// On-disk layout of the local library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryFile {
    /// Library format version
    pub version: u32,
    /// Last time the library was written
    pub updated_at: DateTime<Utc>,
    /// Every album record ever saved, in or out of the library
    pub albums: Vec<StoredAlbum>,
}

/// An album record plus its library membership
///
/// Records outlive membership: an album removed from the library stays
/// stored so a later sync can re-add it without refetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAlbum {
    #[serde(flatten)]
    pub album: Album,
    #[serde(rename = "inLibrary")]
    pub in_library: bool,
}

impl LibraryFile {
    fn new() -> Self {
        Self {
            version: LIBRARY_VERSION,
            updated_at: Utc::now(),
            albums: Vec::new(),
        }
    }

    fn find_mut(&mut self, album_id: &str) -> Option<&mut StoredAlbum> {
        self.albums.iter_mut().find(|a| a.album.id == album_id)
    }
}

/// Counts shown by the `status` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryStats {
    pub stored: usize,
    pub in_library: usize,
    pub updated_at: DateTime<Utc>,
}

/// Local library store persisted as a single JSON file
pub struct JsonLibraryStore {
    path: PathBuf,
    file: Mutex<LibraryFile>,
}

impl JsonLibraryStore {
    /// Open the library at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let file = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read library file {}", path.display()))?;
            let file: LibraryFile = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse library file {}", path.display()))?;
            debug!(
                "Loaded library: {} albums stored at {}",
                file.albums.len(),
                path.display()
            );
            file
        } else {
            debug!("No library found at {}, starting empty", path.display());
            LibraryFile::new()
        };

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn stats(&self) -> LibraryStats {
        let file = self.file.lock().await;
        LibraryStats {
            stored: file.albums.len(),
            in_library: file.albums.iter().filter(|a| a.in_library).count(),
            updated_at: file.updated_at,
        }
    }

    /// Write the library back to disk (caller holds the lock)
    async fn persist(&self, file: &mut LibraryFile) -> Result<()> {
        file.updated_at = Utc::now();

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create library directory {:?}", parent))?;
        }

        let content =
            serde_json::to_string_pretty(file).context("Failed to serialize library")?;

        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write library file {}", self.path.display()))?;

        debug!("Saved library to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl LocalLibraryStore for JsonLibraryStore {
    async fn get_all_albums_in_library(&self) -> Result<Vec<Album>> {
        let file = self.file.lock().await;
        Ok(file
            .albums
            .iter()
            .filter(|a| a.in_library)
            .map(|a| a.album.clone())
            .collect())
    }

    async fn save_album_if_not_present(&self, album: &Album) -> Result<()> {
        let mut file = self.file.lock().await;

        if file.albums.iter().any(|a| a.album.id == album.id) {
            debug!("Album already stored: {}", album.label());
            return Ok(());
        }

        file.albums.push(StoredAlbum {
            album: album.clone(),
            in_library: false,
        });
        self.persist(&mut file).await
    }

    async fn add_album_to_library(&self, album_id: &str) -> Result<()> {
        let mut file = self.file.lock().await;

        let entry = file
            .find_mut(album_id)
            .ok_or_else(|| anyhow::anyhow!("Album {} is not stored locally", album_id))?;

        if entry.in_library {
            return Ok(());
        }
        entry.in_library = true;
        self.persist(&mut file).await
    }

    async fn remove_album_from_library(&self, album_id: &str) -> Result<()> {
        let mut file = self.file.lock().await;

        match file.find_mut(album_id) {
            Some(entry) if entry.in_library => {
                entry.in_library = false;
                self.persist(&mut file).await
            }
            _ => {
                debug!("Album {} not in library, nothing to remove", album_id);
                Ok(())
            }
        }
    }
}
