//! Library reconciliation
//!
//! Pure comparison (`identity`, `duplicates`, `differences`), the action
//! applier (`apply`) and the state machine that drives both (`engine`).

pub mod apply;
pub mod differences;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod identity;
pub mod stores;

#[cfg(test)]
pub(crate) mod testing;

pub use apply::{
    ApplyReport, Operation, OperationFailure, SyncAction, SyncOptions, SyncPlan, apply_plan,
    apply_sync,
};
pub use differences::{LibraryDifferences, compute_differences};
pub use duplicates::{canonical_albums, find_duplicates};
pub use engine::{SyncEngine, SyncState};
pub use error::{LibrarySide, ReconcileError};
pub use identity::{AlbumIdentityKey, identity_key};
pub use stores::{LocalLibraryStore, RemoteLibraryStore};
