//! Sync engine orchestration
//!
//! Drives one reconciliation lifecycle:
//!
//! ```text
//! Idle -> Computing -> Ready(diff) -> Applying -> Idle
//!            |                           |
//!            +--------> Error <----------+
//! ```
//!
//! Every transition publishes a fresh [`SyncState`] on a watch channel.
//! A newer `request_sync` supersedes whatever is in flight: the older
//! operation's outcome is never published.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::apply::{ApplyReport, SyncAction, SyncOptions, apply_sync};
use super::differences::{LibraryDifferences, compute_differences};
use super::error::{LibrarySide, ReconcileError, Result};
use super::stores::{LocalLibraryStore, RemoteLibraryStore};

/// Lifecycle state observed by the CLI
#[derive(Debug, Clone)]
pub enum SyncState {
    Idle,
    /// Fetching both libraries and diffing them
    Computing,
    /// Differences computed, waiting for the user to pick an action
    Ready(Arc<LibraryDifferences>),
    Applying { action: SyncAction },
    /// Last operation failed; `differences` is kept when an apply failed so
    /// the user can retry without recomputing
    Error {
        message: String,
        differences: Option<Arc<LibraryDifferences>>,
    },
}

impl SyncState {
    pub fn name(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Computing => "computing",
            SyncState::Ready(_) => "ready",
            SyncState::Applying { .. } => "applying",
            SyncState::Error { .. } => "error",
        }
    }

    /// Differences an action could be applied to from this state
    pub fn differences(&self) -> Option<&Arc<LibraryDifferences>> {
        match self {
            SyncState::Ready(diff) => Some(diff),
            SyncState::Error {
                differences: Some(diff),
                ..
            } => Some(diff),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, SyncState::Computing | SyncState::Applying { .. })
    }
}

/// Sync engine that coordinates the local and remote libraries
pub struct SyncEngine<L: ?Sized, R: ?Sized> {
    local: Arc<L>,
    remote: Arc<R>,
    state_tx: watch::Sender<SyncState>,
    /// Bumped by every operation that publishes; stale operations compare
    /// against it before publishing
    generation: AtomicU64,
}

impl<L, R> SyncEngine<L, R>
where
    L: LocalLibraryStore + ?Sized,
    R: RemoteLibraryStore + ?Sized,
{
    /// Create a new sync engine
    pub fn new(local: Arc<L>, remote: Arc<R>) -> Self {
        let (state_tx, _) = watch::channel(SyncState::Idle);
        Self {
            local,
            remote,
            state_tx,
            generation: AtomicU64::new(0),
        }
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state_tx.subscribe()
    }

    /// Current state snapshot
    pub fn state(&self) -> SyncState {
        self.state_tx.borrow().clone()
    }

    /// Fetch both libraries and compute their differences
    ///
    /// Accepted in any state. Returns [`ReconcileError::Superseded`] if a
    /// newer request started before this one finished.
    pub async fn request_sync(&self) -> Result<Arc<LibraryDifferences>> {
        let generation = self.begin(SyncState::Computing);
        info!("Comparing local and Spotify libraries");

        let fetched = tokio::try_join!(
            async {
                self.local
                    .get_all_albums_in_library()
                    .await
                    .map_err(|source| ReconcileError::Fetch {
                        side: LibrarySide::Local,
                        source,
                    })
            },
            async {
                self.remote
                    .fetch_saved_albums()
                    .await
                    .map_err(|source| ReconcileError::Fetch {
                        side: LibrarySide::Remote,
                        source,
                    })
            },
        );

        let (local, remote) = match fetched {
            Ok(collections) => collections,
            Err(err) => {
                error!("Library comparison failed: {}", err);
                let published = self.publish(
                    generation,
                    SyncState::Error {
                        message: err.to_string(),
                        differences: None,
                    },
                );
                return Err(if published { err } else { ReconcileError::Superseded });
            }
        };

        debug!(
            "Fetched {} local and {} remote albums",
            local.len(),
            remote.len()
        );
        let differences = Arc::new(compute_differences(local, remote));
        info!(
            "Local only: {}, Spotify only: {}, in both: {}, duplicates: {}",
            differences.local_only_count(),
            differences.remote_only_count(),
            differences.both_count(),
            differences.total_duplicates()
        );

        if self.publish(generation, SyncState::Ready(differences.clone())) {
            Ok(differences)
        } else {
            Err(ReconcileError::Superseded)
        }
    }

    /// Apply `action` to the differences held by the current state
    ///
    /// Only accepted from `Ready`, or from `Error` when it kept differences.
    /// The move to `Applying` is atomic, so a second call on the same
    /// snapshot fails with a validation error instead of running twice.
    ///
    /// If a newer request supersedes this apply, the report is still
    /// returned (the operations did happen) but no state is published.
    pub async fn apply_chosen_action(
        &self,
        action: SyncAction,
        options: &SyncOptions,
    ) -> Result<ApplyReport> {
        let mut claimed: Option<(u64, Arc<LibraryDifferences>)> = None;

        self.state_tx.send_if_modified(|state| {
            let Some(differences) = state.differences().cloned() else {
                return false;
            };
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            claimed = Some((generation, differences));
            *state = SyncState::Applying { action };
            true
        });

        let Some((generation, differences)) = claimed else {
            return Err(ReconcileError::Validation(format!(
                "cannot apply {} while sync is {}",
                action,
                self.state().name()
            )));
        };

        match apply_sync(
            self.local.as_ref(),
            self.remote.as_ref(),
            &differences,
            action,
            options,
        )
        .await
        {
            Ok(report) => {
                self.publish(generation, SyncState::Idle);
                Ok(report)
            }
            Err(err) => {
                error!("Sync failed: {}", err);
                self.publish(
                    generation,
                    SyncState::Error {
                        message: err.to_string(),
                        differences: Some(differences),
                    },
                );
                Err(err)
            }
        }
    }

    /// Return to `Idle`, discarding anything in flight
    pub fn dismiss(&self) {
        self.begin(SyncState::Idle);
    }

    /// Start a new generation and publish its first state
    fn begin(&self, state: SyncState) -> u64 {
        let mut generation = 0;
        self.state_tx.send_modify(|current| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *current = state;
        });
        generation
    }

    /// Publish `state` only if `generation` is still the latest
    fn publish(&self, generation: u64, state: SyncState) -> bool {
        self.state_tx.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("Dropping stale {} result", state.name());
                return false;
            }
            *current = state;
            true
        })
    }
}
