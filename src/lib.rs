//! albumsync - Reconcile a local album library with Spotify saved albums

pub mod cli;
pub mod library;
pub mod spotify;
pub mod sync;
