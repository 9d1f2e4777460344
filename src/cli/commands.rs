//! CLI command handlers

use anyhow::{Context, Result, bail};
use clap::CommandFactory;
use clap_complete::generate;
use colored::Colorize;
use dialoguer::{Confirm, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use super::{Cli, TokenStore};
use crate::library::{Album, AppConfig, JsonLibraryStore};
use crate::spotify::SpotifyClient;
use crate::sync::{
    ApplyReport, LibraryDifferences, ReconcileError, SyncAction, SyncEngine, SyncPlan, SyncState,
};

type Engine = SyncEngine<JsonLibraryStore, SpotifyClient>;

/// Handle the `auth` command
pub async fn auth(token: Option<String>, force: bool, clear: bool) -> Result<()> {
    if clear {
        TokenStore::clear()?;
        println!("{}", "Stored Spotify token removed.".green());
        return Ok(());
    }

    println!("{}", "Configuring Spotify access...".cyan());

    let user = TokenStore::authenticate(token, force).await?;

    println!();
    println!("{}", "Authentication successful!".green().bold());
    println!("  User: {}", user.label());
    println!();
    println!("Token stored securely in system keyring.");

    Ok(())
}

/// Handle the `diff` command
pub async fn diff(library: Option<PathBuf>, token: Option<String>, json: bool) -> Result<()> {
    let config = AppConfig::load()?;
    let engine = build_engine(&config, library, token)?;

    let differences = with_spinner(engine.subscribe(), engine.request_sync())
        .await
        .map_err(with_retry_hint)?;

    if json {
        let output = serde_json::to_string_pretty(differences.as_ref())
            .context("Failed to serialize differences")?;
        println!("{}", output);
    } else {
        print_differences(&differences);
    }

    Ok(())
}

/// Handle the `sync` command
pub async fn sync(
    library: Option<PathBuf>,
    token: Option<String>,
    action: Option<SyncAction>,
    keep_duplicates: bool,
    dry_run: bool,
    yes: bool,
) -> Result<()> {
    let config = AppConfig::load()?;
    let options = config.sync_options(keep_duplicates);
    let engine = build_engine(&config, library, token)?;

    let differences = with_spinner(engine.subscribe(), engine.request_sync())
        .await
        .map_err(with_retry_hint)?;
    print_differences(&differences);

    let action = match action.or(config.default_action()?) {
        Some(action) => action,
        None => choose_action(&differences)?,
    };

    let plan = SyncPlan::build(&differences, action, &options);
    if plan.is_empty() {
        println!();
        println!("{}", format!("Nothing to do for {}.", action).green());
        engine.dismiss();
        return Ok(());
    }

    if dry_run {
        println!();
        println!("{}", format!("[DRY RUN] {} would:", action).yellow());
        print_plan(&plan);
        return Ok(());
    }

    if !yes && !confirm_apply(&plan)? {
        println!("{}", "Sync cancelled.".yellow());
        engine.dismiss();
        return Ok(());
    }

    let result = with_spinner(
        engine.subscribe(),
        engine.apply_chosen_action(action, &options),
    )
    .await;

    match result {
        Ok(report) => {
            println!();
            println!("{}", "Sync complete!".green().bold());
            print_report(&report);
            Ok(())
        }
        Err(ReconcileError::Apply { action, report }) => {
            println!();
            println!("{}", "Sync finished with errors.".red().bold());
            print_report(&report);
            println!();
            println!(
                "Run {} again to retry the failed operations.",
                "albumsync sync".cyan()
            );
            bail!(
                "{} of {} operations failed while applying {}",
                report.failures.len(),
                report.attempted(),
                action
            )
        }
        Err(e) => Err(with_retry_hint(e)),
    }
}

/// Handle the `status` command
pub async fn status(library: Option<PathBuf>, token: Option<String>) -> Result<()> {
    let config = AppConfig::load()?;
    let path = match library {
        Some(path) => path,
        None => config.library_path()?,
    };

    println!("{}", "Local library".green().bold());
    println!("  File: {}", path.display());
    if path.exists() {
        let stats = JsonLibraryStore::open(&path)?.stats().await;
        println!("  Albums in library: {}", stats.in_library);
        println!("  Albums stored: {}", stats.stored);
        println!(
            "  Last updated: {}",
            stats.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    } else {
        println!("  {}", "No library file yet.".yellow());
    }

    println!();
    println!("{}", "Spotify".green().bold());
    if token.is_some() {
        println!("  Token: from command line or SPOTIFY_TOKEN");
    } else if TokenStore::exists() {
        println!("  Token: stored in keyring");
    } else {
        println!(
            "  Token: {} (run {})",
            "not configured".yellow(),
            "albumsync auth".cyan()
        );
    }

    Ok(())
}

/// Handle the `config` command
pub fn config(init: bool) -> Result<()> {
    let path = AppConfig::config_path()?;

    if init {
        if path.exists() {
            println!(
                "{}",
                format!("Config already exists at {}", path.display()).yellow()
            );
        } else {
            AppConfig::default().save_to(&path)?;
            println!("{} {}", "Wrote default config to".green(), path.display());
        }
    }

    let config = AppConfig::load_from(&path)?;
    // Surface a bad default_action here rather than at sync time
    config.default_action()?;

    println!("{} {}", "Config file:".bold(), path.display());
    println!("  Library: {}", config.library_path()?.display());
    println!("  Remove duplicates: {}", config.remove_duplicates);
    println!("  Local concurrency: {}", config.local_concurrency);
    println!("  Spotify batch size: {}", config.remote_batch_size);
    println!(
        "  Default action: {}",
        config.default_action.as_deref().unwrap_or("(prompt)")
    );

    Ok(())
}

/// Handle the `completion` command
pub fn completion(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "albumsync", &mut io::stdout());
}

fn build_engine(
    config: &AppConfig,
    library: Option<PathBuf>,
    token: Option<String>,
) -> Result<Engine> {
    let path = match library {
        Some(path) => path,
        None => config.library_path()?,
    };
    let local = JsonLibraryStore::open(path)?;
    debug!("Using local library {}", local.path().display());

    let token = TokenStore::resolve(token)?;
    let remote = SpotifyClient::new(&token)?.with_batch_size(config.remote_batch_size);
    debug!("Sending up to {} album ids per request", remote.batch_size());

    Ok(SyncEngine::new(Arc::new(local), Arc::new(remote)))
}

/// Point at a rerun when the failure may be transient
fn with_retry_hint(err: ReconcileError) -> anyhow::Error {
    if err.is_retryable() {
        eprintln!(
            "{}",
            "This may be temporary; run the command again to retry.".yellow()
        );
    }
    err.into()
}

/// Drive `operation` while a spinner mirrors the engine's busy states
async fn with_spinner<T>(
    mut states: watch::Receiver<SyncState>,
    operation: impl Future<Output = T>,
) -> T {
    let spinner = if console::user_attended() {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    } else {
        ProgressBar::hidden()
    };
    spinner.set_message("Working...");
    show_busy_state(&spinner, &mut states);

    tokio::pin!(operation);
    let output = loop {
        tokio::select! {
            output = &mut operation => break output,
            changed = states.changed() => {
                if changed.is_err() {
                    break (&mut operation).await;
                }
                show_busy_state(&spinner, &mut states);
            }
        }
    };

    spinner.finish_and_clear();
    output
}

fn show_busy_state(spinner: &ProgressBar, states: &mut watch::Receiver<SyncState>) {
    let state = states.borrow_and_update();
    if state.is_busy() {
        spinner.set_message(state_message(&state));
    }
}

fn state_message(state: &SyncState) -> String {
    match state {
        SyncState::Computing => "Comparing local and Spotify libraries...".to_string(),
        SyncState::Applying { action } => format!("Applying {}...", action),
        other => other.name().to_string(),
    }
}

fn choose_action(differences: &LibraryDifferences) -> Result<SyncAction> {
    if !console::user_attended() {
        bail!("No sync action given. Pass --action or set default_action in the config file");
    }

    let items: Vec<String> = SyncAction::ALL
        .iter()
        .map(|action| {
            format!(
                "{:<14} {} ({} albums)",
                action.as_str(),
                action.description(),
                differences.projected_count(*action)
            )
        })
        .collect();

    println!();
    let selection = Select::new()
        .with_prompt("How should the libraries be reconciled?")
        .items(&items)
        .default(0)
        .interact()
        .context("Failed to read sync action")?;

    Ok(SyncAction::ALL[selection])
}

fn confirm_apply(plan: &SyncPlan) -> Result<bool> {
    if !console::user_attended() {
        bail!("Refusing to change libraries without confirmation. Pass --yes to apply");
    }

    println!();
    print_plan(plan);
    println!();
    Confirm::new()
        .with_prompt(format!(
            "Apply {} to {} album(s)?",
            plan.action,
            plan.album_count()
        ))
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

fn print_differences(differences: &LibraryDifferences) {
    println!();
    println!("{}", "Library comparison".bold());
    println!(
        "  Local library: {} albums, Spotify: {} albums",
        differences.local_count(),
        differences.remote_count()
    );
    println!("  In both: {}", differences.both_count());
    println!("  Only local: {}", differences.local_only_count());
    println!("  Only on Spotify: {}", differences.remote_only_count());

    print_duplicates("local", differences.local_duplicates());
    print_duplicates("Spotify", differences.remote_duplicates());

    if differences.is_in_sync() {
        println!();
        println!("{}", "Libraries contain the same albums.".green());
        return;
    }

    println!();
    println!("{}", "Library size after each action".bold());
    for action in SyncAction::ALL {
        println!(
            "  {} {}",
            format!("{:<14}", action.as_str()).cyan(),
            differences.projected_count(action)
        );
    }
}

fn print_duplicates(side: &str, duplicates: &[Album]) {
    if duplicates.is_empty() {
        return;
    }
    println!(
        "  {}",
        format!("{} duplicate(s) in {} library:", duplicates.len(), side).yellow()
    );
    for album in duplicates {
        println!("    - {}", album.label());
    }
}

fn print_plan(plan: &SyncPlan) {
    print_albums("Add to local library", &plan.pull_into_local);
    print_albums("Remove from local library", &plan.remove_from_local);
    print_albums("Save to Spotify", &plan.push_to_remote);
    print_albums("Remove from Spotify", &plan.remove_from_remote);
}

fn print_albums(heading: &str, albums: &[Album]) {
    if albums.is_empty() {
        return;
    }
    println!("  {} ({}):", heading.bold(), albums.len());
    for album in albums {
        println!("    - {}", album.label());
    }
}

fn print_report(report: &ApplyReport) {
    println!("  Added to local library: {}", report.pulled_into_local);
    println!("  Removed from local library: {}", report.removed_from_local);
    println!("  Saved to Spotify: {}", report.pushed_to_remote);
    println!("  Removed from Spotify: {}", report.removed_from_remote);

    if !report.failures.is_empty() {
        println!("  {}", format!("Failed: {}", report.failures.len()).red());
        for failure in &report.failures {
            println!(
                "    - {} {}: {}",
                failure.operation,
                failure.target,
                failure.message.red()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_message() {
        assert!(state_message(&SyncState::Computing).starts_with("Comparing"));
        assert_eq!(
            state_message(&SyncState::Applying {
                action: SyncAction::Intersection
            }),
            "Applying intersection..."
        );
        assert_eq!(state_message(&SyncState::Idle), "idle");
    }

    #[test]
    fn test_retry_hint_keeps_error_message() {
        let err = with_retry_hint(ReconcileError::Validation("bad action".to_string()));
        assert_eq!(err.to_string(), "Invalid sync request: bad action");
        assert!(err.downcast_ref::<ReconcileError>().is_some());
    }

    #[tokio::test]
    async fn test_with_spinner_returns_operation_output() {
        let (tx, rx) = watch::channel(SyncState::Idle);
        let output = with_spinner(rx, async move {
            tx.send_replace(SyncState::Computing);
            tokio::task::yield_now().await;
            42
        })
        .await;
        assert_eq!(output, 42);
    }
}
