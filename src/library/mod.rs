//! Local album library module

pub mod album;
pub mod config;
pub mod store;

pub use album::Album;
pub use config::AppConfig;
pub use store::{JsonLibraryStore, LibraryStats};
