//! Application configuration persistence
//!
//! Stores sync preferences in ~/.config/albumsync/config.json. Every value
//! has a default, so a missing file or missing keys are not errors.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::spotify::MAX_IDS_PER_REQUEST;
use crate::sync::{ReconcileError, SyncAction, SyncOptions};

const CONFIG_VERSION: u32 = 1;

/// Persistent application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Config format version
    pub version: u32,
    /// Local library file (defaults to the platform data directory)
    pub library_path: Option<PathBuf>,
    /// Remove superseded duplicates while applying a sync
    pub remove_duplicates: bool,
    /// Max in-flight local library operations during a sync
    pub local_concurrency: usize,
    /// Album ids per Spotify add/remove request
    pub remote_batch_size: usize,
    /// Action used by `sync` when none is given on the command line
    pub default_action: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            library_path: None,
            remove_duplicates: true,
            local_concurrency: 4,
            remote_batch_size: MAX_IDS_PER_REQUEST,
            default_action: None,
        }
    }
}

impl AppConfig {
    /// Load the config from its default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load the config from `path`, falling back to defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        let config: Self =
            serde_json::from_str(&contents).with_context(|| "Failed to parse config")?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save the config to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("albumsync").join("config.json"))
    }

    /// Resolve the local library file
    pub fn library_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.library_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("albumsync").join("library.json"))
    }

    /// Parse the configured default action, if any
    pub fn default_action(&self) -> Result<Option<SyncAction>, ReconcileError> {
        self.default_action
            .as_deref()
            .map(str::parse::<SyncAction>)
            .transpose()
    }

    /// Options for one sync run; `keep_duplicates` overrides the config
    pub fn sync_options(&self, keep_duplicates: bool) -> SyncOptions {
        SyncOptions {
            remove_duplicates: self.remove_duplicates && !keep_duplicates,
            local_concurrency: self.local_concurrency.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.json")).unwrap();

        assert_eq!(config, AppConfig::default());
        assert!(config.remove_duplicates);
        assert_eq!(config.remote_batch_size, 20);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "default_action": "intersection" }"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.local_concurrency, 4);
        assert_eq!(
            config.default_action().unwrap(),
            Some(SyncAction::Intersection)
        );
    }

    #[test]
    fn test_unknown_default_action_is_validation_error() {
        let config = AppConfig {
            default_action: Some("merge-everything".to_string()),
            ..AppConfig::default()
        };

        assert!(matches!(
            config.default_action(),
            Err(ReconcileError::Validation(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("albumsync").join("config.json");
        let config = AppConfig {
            library_path: Some(PathBuf::from("/music/library.json")),
            remove_duplicates: false,
            ..AppConfig::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_keep_duplicates_overrides_config() {
        let config = AppConfig::default();
        assert!(config.sync_options(false).remove_duplicates);
        assert!(!config.sync_options(true).remove_duplicates);
    }
}
