//! In-memory library stores that record every call

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

use super::stores::{LocalLibraryStore, RemoteLibraryStore};
use crate::library::Album;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalCall {
    Save(String),
    Add(String),
    Remove(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Add(Vec<String>),
    Remove(Vec<String>),
}

#[derive(Default)]
pub struct RecordingLocal {
    stored: Mutex<Vec<Album>>,
    library: Mutex<Vec<Album>>,
    calls: Mutex<Vec<LocalCall>>,
    failing_ids: HashSet<String>,
    fail_fetch: bool,
}

impl RecordingLocal {
    pub fn with_albums(albums: Vec<Album>) -> Self {
        Self {
            stored: Mutex::new(albums.clone()),
            library: Mutex::new(albums),
            ..Self::default()
        }
    }

    /// Every write touching `album_id` fails
    pub fn failing_on(mut self, album_id: &str) -> Self {
        self.failing_ids.insert(album_id.to_string());
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn calls(&self) -> Vec<LocalCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn library(&self) -> Vec<Album> {
        self.library.lock().unwrap().clone()
    }

    fn record(&self, call: LocalCall, album_id: &str) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing_ids.contains(album_id) {
            bail!("local store rejected {}", album_id);
        }
        Ok(())
    }
}

#[async_trait]
impl LocalLibraryStore for RecordingLocal {
    async fn get_all_albums_in_library(&self) -> Result<Vec<Album>> {
        if self.fail_fetch {
            bail!("database is locked");
        }
        Ok(self.library())
    }

    async fn save_album_if_not_present(&self, album: &Album) -> Result<()> {
        self.record(LocalCall::Save(album.id.clone()), &album.id)?;
        let mut stored = self.stored.lock().unwrap();
        if !stored.iter().any(|a| a.id == album.id) {
            stored.push(album.clone());
        }
        Ok(())
    }

    async fn add_album_to_library(&self, album_id: &str) -> Result<()> {
        self.record(LocalCall::Add(album_id.to_string()), album_id)?;
        let stored = self.stored.lock().unwrap();
        let Some(album) = stored.iter().find(|a| a.id == album_id) else {
            bail!("album {} is not stored", album_id);
        };
        let mut library = self.library.lock().unwrap();
        if !library.iter().any(|a| a.id == album_id) {
            library.push(album.clone());
        }
        Ok(())
    }

    async fn remove_album_from_library(&self, album_id: &str) -> Result<()> {
        self.record(LocalCall::Remove(album_id.to_string()), album_id)?;
        self.library.lock().unwrap().retain(|a| a.id != album_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingRemote {
    saved: Mutex<Vec<Album>>,
    calls: Mutex<Vec<RemoteCall>>,
    fetches: AtomicUsize,
    fail_fetch: bool,
    fail_first_fetch: bool,
    fail_writes: bool,
    first_fetch_gate: Option<Arc<Notify>>,
    write_gate: Option<Arc<Notify>>,
}

impl RecordingRemote {
    pub fn with_albums(albums: Vec<Album>) -> Self {
        Self {
            saved: Mutex::new(albums),
            ..Self::default()
        }
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Only the first fetch fails
    pub fn failing_first_fetch(mut self) -> Self {
        self.fail_first_fetch = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// The first fetch waits until `gate` is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.first_fetch_gate = Some(gate);
        self
    }

    /// Every write is recorded, then waits until `gate` is notified
    pub fn gated_writes(mut self, gate: Arc<Notify>) -> Self {
        self.write_gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<Album> {
        self.saved.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn replace_saved(&self, albums: Vec<Album>) {
        *self.saved.lock().unwrap() = albums;
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.write_gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl RemoteLibraryStore for RecordingRemote {
    async fn fetch_saved_albums(&self) -> Result<Vec<Album>> {
        let call = self.fetches.fetch_add(1, Ordering::SeqCst);
        // Snapshot before waiting so a gated fetch returns stale data.
        let snapshot = self.saved();
        if call == 0 {
            if let Some(gate) = &self.first_fetch_gate {
                gate.notified().await;
            }
        }
        if self.fail_fetch || (self.fail_first_fetch && call == 0) {
            bail!("503 Service Unavailable");
        }
        Ok(snapshot)
    }

    async fn add_albums_to_remote_library(&self, albums: &[Album]) -> Result<()> {
        let ids = albums.iter().map(|a| a.id.clone()).collect();
        self.calls.lock().unwrap().push(RemoteCall::Add(ids));
        self.wait_for_gate().await;
        if self.fail_writes {
            bail!("429 Too Many Requests");
        }
        let mut saved = self.saved.lock().unwrap();
        for album in albums {
            if !saved.iter().any(|a| a.id == album.id) {
                saved.push(album.clone());
            }
        }
        Ok(())
    }

    async fn remove_albums_from_remote_library(&self, albums: &[Album]) -> Result<()> {
        let ids: Vec<String> = albums.iter().map(|a| a.id.clone()).collect();
        self.calls.lock().unwrap().push(RemoteCall::Remove(ids.clone()));
        self.wait_for_gate().await;
        if self.fail_writes {
            bail!("429 Too Many Requests");
        }
        self.saved.lock().unwrap().retain(|a| !ids.contains(&a.id));
        Ok(())
    }
}
