//! Applying a chosen sync action to both libraries
//!
//! | Action       | Local-only albums     | Remote-only albums    |
//! |--------------|-----------------------|-----------------------|
//! | Combine      | push to remote        | pull into local       |
//! | PreferRemote | remove from local     | leave as-is           |
//! | PreferLocal  | leave as-is           | remove from remote    |
//! | Intersection | remove from local     | remove from remote    |
//!
//! Application is best-effort: every planned operation is attempted and
//! failures are collected into the [`ApplyReport`]. Nothing is rolled back.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::differences::LibraryDifferences;
use super::duplicates::canonical_albums;
use super::error::{ReconcileError, Result};
use super::identity::AlbumIdentityKey;
use super::stores::{LocalLibraryStore, RemoteLibraryStore};
use crate::library::Album;

/// How to reconcile the two libraries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncAction {
    /// Keep every album from both sides
    Combine,
    /// The remote library is authoritative
    PreferRemote,
    /// The local library is authoritative
    PreferLocal,
    /// Keep only albums present on both sides
    Intersection,
}

impl SyncAction {
    pub const ALL: [SyncAction; 4] = [
        SyncAction::Combine,
        SyncAction::PreferRemote,
        SyncAction::PreferLocal,
        SyncAction::Intersection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Combine => "combine",
            SyncAction::PreferRemote => "prefer-remote",
            SyncAction::PreferLocal => "prefer-local",
            SyncAction::Intersection => "intersection",
        }
    }

    /// One-line explanation for prompts
    pub fn description(&self) -> &'static str {
        match self {
            SyncAction::Combine => "Keep all albums from both libraries",
            SyncAction::PreferRemote => "Drop local albums that are not saved on Spotify",
            SyncAction::PreferLocal => "Drop Spotify albums that are not in the local library",
            SyncAction::Intersection => "Keep only albums present in both libraries",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = ReconcileError;

    /// Accepts kebab, snake or camel case, ignoring ASCII case
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "combine" => Ok(SyncAction::Combine),
            "preferremote" => Ok(SyncAction::PreferRemote),
            "preferlocal" => Ok(SyncAction::PreferLocal),
            "intersection" => Ok(SyncAction::Intersection),
            _ => Err(ReconcileError::Validation(format!(
                "unknown sync action '{}' (expected one of: combine, prefer-remote, prefer-local, intersection)",
                s
            ))),
        }
    }
}

/// Per-run sync settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Also remove each side's superseded duplicates
    pub remove_duplicates: bool,
    /// Max in-flight local library operations
    pub local_concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            remove_duplicates: true,
            local_concurrency: 4,
        }
    }
}

/// Every operation an action will issue, grouped by direction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncPlan {
    pub action: SyncAction,
    /// Save locally, then add to the local library
    pub pull_into_local: Vec<Album>,
    pub remove_from_local: Vec<Album>,
    pub push_to_remote: Vec<Album>,
    pub remove_from_remote: Vec<Album>,
}

impl SyncPlan {
    /// Plan `action` against a differences snapshot
    pub fn build(diff: &LibraryDifferences, action: SyncAction, options: &SyncOptions) -> Self {
        let local_only: Vec<Album> = diff.local_only_albums().into_iter().cloned().collect();
        let remote_only: Vec<Album> = diff.remote_only_albums().into_iter().cloned().collect();

        let mut plan = SyncPlan {
            action,
            pull_into_local: Vec::new(),
            remove_from_local: Vec::new(),
            push_to_remote: Vec::new(),
            remove_from_remote: Vec::new(),
        };

        let (dropped_local, dropped_remote) = match action {
            SyncAction::Combine => {
                plan.push_to_remote = local_only;
                plan.pull_into_local = remote_only;
                (Vec::new(), Vec::new())
            }
            SyncAction::PreferRemote => (local_only, Vec::new()),
            SyncAction::PreferLocal => (Vec::new(), remote_only),
            SyncAction::Intersection => (local_only, remote_only),
        };

        plan.remove_from_local = duplicates_to_remove(
            diff.local_collection(),
            diff.local_duplicates(),
            &dropped_local,
            options.remove_duplicates,
        );
        plan.remove_from_local.extend(dropped_local);

        plan.remove_from_remote = duplicates_to_remove(
            diff.remote_collection(),
            diff.remote_duplicates(),
            &dropped_remote,
            options.remove_duplicates,
        );
        plan.remove_from_remote.extend(dropped_remote);

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.pull_into_local.is_empty()
            && self.remove_from_local.is_empty()
            && self.push_to_remote.is_empty()
            && self.remove_from_remote.is_empty()
    }

    /// Number of albums touched across both sides
    pub fn album_count(&self) -> usize {
        self.pull_into_local.len()
            + self.remove_from_local.len()
            + self.push_to_remote.len()
            + self.remove_from_remote.len()
    }
}

/// Superseded copies to remove from one side
///
/// Every copy when `remove_all` is set, otherwise only copies of albums the
/// plan drops from that side, so a dropped album cannot resurface on the
/// next comparison. Copies sharing an id with a canonical album are skipped:
/// removing by id would take the canonical record with them.
fn duplicates_to_remove(
    collection: &[Album],
    duplicates: &[Album],
    dropped: &[Album],
    remove_all: bool,
) -> Vec<Album> {
    let dropped_keys: HashSet<AlbumIdentityKey> = dropped.iter().map(Album::identity_key).collect();
    let canonical_ids: HashSet<&str> = canonical_albums(collection)
        .into_iter()
        .map(|album| album.id.as_str())
        .collect();

    duplicates
        .iter()
        .filter(|album| !canonical_ids.contains(album.id.as_str()))
        .filter(|album| remove_all || dropped_keys.contains(&album.identity_key()))
        .cloned()
        .collect()
}

/// A single collaborator call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    SaveLocal,
    AddToLocalLibrary,
    RemoveFromLocalLibrary,
    AddToRemoteLibrary,
    RemoveFromRemoteLibrary,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::SaveLocal => "save locally",
            Operation::AddToLocalLibrary => "add to local library",
            Operation::RemoveFromLocalLibrary => "remove from local library",
            Operation::AddToRemoteLibrary => "add to Spotify library",
            Operation::RemoveFromRemoteLibrary => "remove from Spotify library",
        };
        f.write_str(name)
    }
}

/// A collaborator call that failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationFailure {
    pub operation: Operation,
    /// Album label, or a batch description for remote calls
    pub target: String,
    pub message: String,
}

/// Outcome of applying a plan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyReport {
    pub pulled_into_local: usize,
    pub removed_from_local: usize,
    pub pushed_to_remote: usize,
    pub removed_from_remote: usize,
    pub failures: Vec<OperationFailure>,
}

impl ApplyReport {
    pub fn succeeded(&self) -> usize {
        self.pulled_into_local
            + self.removed_from_local
            + self.pushed_to_remote
            + self.removed_from_remote
    }

    /// Albums whose operations were attempted
    pub fn attempted(&self) -> usize {
        self.succeeded() + self.failures.len()
    }

    fn merge(&mut self, other: ApplyReport) {
        self.pulled_into_local += other.pulled_into_local;
        self.removed_from_local += other.removed_from_local;
        self.pushed_to_remote += other.pushed_to_remote;
        self.removed_from_remote += other.removed_from_remote;
        self.failures.extend(other.failures);
    }
}

/// Apply `action` to both libraries
///
/// Returns [`ReconcileError::Apply`] carrying the full report if any
/// operation failed.
pub async fn apply_sync<L, R>(
    local: &L,
    remote: &R,
    diff: &LibraryDifferences,
    action: SyncAction,
    options: &SyncOptions,
) -> Result<ApplyReport>
where
    L: LocalLibraryStore + ?Sized,
    R: RemoteLibraryStore + ?Sized,
{
    let plan = SyncPlan::build(diff, action, options);
    info!(
        "Applying {}: {} to pull, {} to push, {} local removals, {} remote removals",
        action,
        plan.pull_into_local.len(),
        plan.push_to_remote.len(),
        plan.remove_from_local.len(),
        plan.remove_from_remote.len()
    );

    let report = apply_plan(local, remote, &plan, options).await;

    if report.failures.is_empty() {
        info!("{} applied: {} albums updated", action, report.succeeded());
        Ok(report)
    } else {
        warn!(
            "{} finished with {} failed operations",
            action,
            report.failures.len()
        );
        Err(ReconcileError::Apply { action, report })
    }
}

/// Execute a plan; local and remote sides run concurrently
pub async fn apply_plan<L, R>(
    local: &L,
    remote: &R,
    plan: &SyncPlan,
    options: &SyncOptions,
) -> ApplyReport
where
    L: LocalLibraryStore + ?Sized,
    R: RemoteLibraryStore + ?Sized,
{
    let (mut report, remote_report) = futures::join!(
        apply_local(local, plan, options.local_concurrency),
        apply_remote(remote, plan),
    );
    report.merge(remote_report);
    report
}

enum LocalOp<'a> {
    Pull(&'a Album),
    Remove(&'a Album),
}

async fn apply_local<L>(local: &L, plan: &SyncPlan, concurrency: usize) -> ApplyReport
where
    L: LocalLibraryStore + ?Sized,
{
    let ops = plan
        .pull_into_local
        .iter()
        .map(LocalOp::Pull)
        .chain(plan.remove_from_local.iter().map(LocalOp::Remove));

    let outcomes: Vec<std::result::Result<LocalOp<'_>, OperationFailure>> = stream::iter(ops)
        .map(|op| async move {
            match op {
                LocalOp::Pull(album) => {
                    debug!("Pulling into local library: {}", album.label());
                    local
                        .save_album_if_not_present(album)
                        .await
                        .map_err(|e| failure(Operation::SaveLocal, album.label(), e))?;
                    local
                        .add_album_to_library(&album.id)
                        .await
                        .map_err(|e| failure(Operation::AddToLocalLibrary, album.label(), e))?;
                    Ok::<_, OperationFailure>(LocalOp::Pull(album))
                }
                LocalOp::Remove(album) => {
                    debug!("Removing from local library: {}", album.label());
                    local
                        .remove_album_from_library(&album.id)
                        .await
                        .map_err(|e| failure(Operation::RemoveFromLocalLibrary, album.label(), e))?;
                    Ok::<_, OperationFailure>(LocalOp::Remove(album))
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .boxed()
        .collect()
        .await;

    let mut report = ApplyReport::default();
    for outcome in outcomes {
        match outcome {
            Ok(LocalOp::Pull(_)) => report.pulled_into_local += 1,
            Ok(LocalOp::Remove(_)) => report.removed_from_local += 1,
            Err(f) => report.failures.push(f),
        }
    }
    report
}

async fn apply_remote<R>(remote: &R, plan: &SyncPlan) -> ApplyReport
where
    R: RemoteLibraryStore + ?Sized,
{
    let mut report = ApplyReport::default();

    if !plan.push_to_remote.is_empty() {
        debug!("Adding {} albums to Spotify", plan.push_to_remote.len());
        match remote.add_albums_to_remote_library(&plan.push_to_remote).await {
            Ok(()) => report.pushed_to_remote += plan.push_to_remote.len(),
            Err(e) => report.failures.push(failure(
                Operation::AddToRemoteLibrary,
                batch_label(&plan.push_to_remote),
                e,
            )),
        }
    }

    if !plan.remove_from_remote.is_empty() {
        debug!("Removing {} albums from Spotify", plan.remove_from_remote.len());
        match remote
            .remove_albums_from_remote_library(&plan.remove_from_remote)
            .await
        {
            Ok(()) => report.removed_from_remote += plan.remove_from_remote.len(),
            Err(e) => report.failures.push(failure(
                Operation::RemoveFromRemoteLibrary,
                batch_label(&plan.remove_from_remote),
                e,
            )),
        }
    }

    report
}

fn failure(operation: Operation, target: String, error: anyhow::Error) -> OperationFailure {
    warn!("Failed to {} ({}): {:#}", operation, target, error);
    OperationFailure {
        operation,
        target,
        message: format!("{:#}", error),
    }
}

fn batch_label(albums: &[Album]) -> String {
    match albums {
        [single] => single.label(),
        _ => format!("{} albums", albums.len()),
    }
}
