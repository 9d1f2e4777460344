//! albumsync - Reconcile a local album library with Spotify saved albums

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use albumsync::cli::{self, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "albumsync=debug,reqwest=debug"
    } else {
        "albumsync=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Auth { force, clear } => {
            cli::commands::auth(cli.token, force, clear).await?;
        }
        Commands::Diff { json } => {
            cli::commands::diff(cli.library, cli.token, json).await?;
        }
        Commands::Sync {
            action,
            keep_duplicates,
            dry_run,
            yes,
        } => {
            cli::commands::sync(cli.library, cli.token, action, keep_duplicates, dry_run, yes)
                .await?;
        }
        Commands::Status => {
            cli::commands::status(cli.library, cli.token).await?;
        }
        Commands::Config { init } => {
            cli::commands::config(init)?;
        }
        Commands::Completion { shell } => {
            cli::commands::completion(shell);
        }
    }

    Ok(())
}
