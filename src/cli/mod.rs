//! CLI module for albumsync

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::sync::SyncAction;

pub mod auth;
pub mod commands;

pub use auth::TokenStore;

#[derive(Parser, Debug)]
#[command(
    name = "albumsync",
    about = "Reconcile a local album library with Spotify saved albums"
)]
#[command(version, author)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Local library file (overrides the config file)
    #[arg(long, global = true, env = "ALBUMSYNC_LIBRARY", value_name = "PATH")]
    pub library: Option<PathBuf>,

    /// Spotify access token (overrides the keyring)
    #[arg(long, global = true, env = "SPOTIFY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store, verify or clear the Spotify access token
    ///
    /// The token comes from `--token`/`SPOTIFY_TOKEN`, or is prompted for.
    Auth {
        /// Replace the stored token even if it still works
        #[arg(long)]
        force: bool,

        /// Remove the stored token
        #[arg(long, conflicts_with = "force")]
        clear: bool,
    },

    /// Show how the local and Spotify libraries differ
    Diff {
        /// Print the full comparison as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reconcile the two libraries
    Sync {
        /// Sync action (prompted for when omitted and no default is configured)
        #[arg(short, long, value_parser = parse_action)]
        action: Option<SyncAction>,

        /// Leave duplicate albums in place
        #[arg(long)]
        keep_duplicates: bool,

        /// Dry run - print the planned operations without applying them
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show local library status
    Status,

    /// Show or initialize the config file
    Config {
        /// Write a config file with default values
        #[arg(long)]
        init: bool,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

fn parse_action(value: &str) -> Result<SyncAction, String> {
    value.parse().map_err(|e: crate::sync::ReconcileError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync_flags() {
        let cli = Cli::try_parse_from([
            "albumsync",
            "sync",
            "--action",
            "prefer_remote",
            "--keep-duplicates",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::Sync {
                action,
                keep_duplicates,
                dry_run,
                yes,
            } => {
                assert_eq!(action, Some(SyncAction::PreferRemote));
                assert!(keep_duplicates);
                assert!(dry_run);
                assert!(!yes);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let result = Cli::try_parse_from(["albumsync", "sync", "--action", "merge"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_library_flag() {
        let cli =
            Cli::try_parse_from(["albumsync", "status", "--library", "/tmp/lib.json"]).unwrap();
        assert_eq!(cli.library, Some(PathBuf::from("/tmp/lib.json")));
    }

    #[test]
    fn test_clear_conflicts_with_force() {
        let result = Cli::try_parse_from(["albumsync", "auth", "--clear", "--force"]);
        assert!(result.is_err());
    }
}
