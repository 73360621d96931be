//! StoryScape - offline favorites inspection
//!
//! Reads the favorites cache directly from disk; no network or sign-in needed.
//!
//! ## Usage
//!
//! ```bash
//! # List cached favorites, newest first
//! storyscape favorites list
//!
//! # Only titles containing "dragon"
//! storyscape favorites list --search dragon
//!
//! # Show one favorite (full or partial id)
//! storyscape favorites show 3f2a
//!
//! # Remove one favorite and its images
//! storyscape favorites remove 3f2a
//!
//! # Remove everything
//! storyscape favorites clear --yes
//! ```

mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use storyscape_core::{AssetSlot, FetchError, StoryId, title_matches};
use storyscape_library::{HttpAssetFetcher, LibraryConfig};
use storyscape_logging::{LogConfig, StoryscapeSubscriberBuilder};
use storyscape_storage::{LocalFavoritesStore, StorageError};
use tracing::debug;

use display::*;

/// CLI errors
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Could not set up asset fetching: {0}")]
    Fetch(#[from] FetchError),
    #[error("No favorite matches '{0}'")]
    NotFound(String),
    #[error("'{0}' matches {1} favorites, use a longer id")]
    Ambiguous(String, usize),
    #[error("Refusing to clear without --yes")]
    ConfirmationRequired,
}

/// StoryScape - offline favorites inspection
#[derive(Parser)]
#[command(name = "storyscape")]
#[command(about = "Inspect the StoryScape offline favorites cache")]
#[command(version)]
struct Cli {
    /// Favorites directory (defaults to the platform data directory)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage cached favorites
    #[command(subcommand)]
    Favorites(FavoritesCommand),
}

#[derive(Subcommand)]
enum FavoritesCommand {
    /// List favorites, newest first
    List {
        /// Only titles containing this text (case-insensitive)
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show a favorite in detail
    Show {
        /// Story ID (full or partial)
        id: String,
    },
    /// Remove a favorite and its cached images
    Remove {
        /// Story ID (full or partial)
        id: String,
    },
    /// Remove every favorite and cached image
    Clear {
        /// Confirm the removal
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    let _guard = StoryscapeSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .with_level(level)
        .init();

    if let Err(e) = run(cli).await {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = LibraryConfig::default();
    let dir = cli.dir.unwrap_or_else(|| config.favorites_path());
    let Commands::Favorites(command) = cli.command;
    run_favorites(&config, &dir, command).await
}

async fn run_favorites(
    config: &LibraryConfig,
    dir: &Path,
    command: FavoritesCommand,
) -> Result<(), CliError> {
    // Inspecting must never create the cache directory
    let exists = tokio::fs::try_exists(dir)
        .await
        .map_err(|e| StorageError::io(format!("{}: {e}", dir.display())))?;
    if !exists {
        debug!(dir = %dir.display(), "No favorites directory");
        return cmd_without_cache(command);
    }
    debug!(dir = %dir.display(), "Opening favorites cache");

    // The CLI never saves, but the store needs a fetcher
    let fetcher = HttpAssetFetcher::new(config.fetch_timeout())?;
    let store = LocalFavoritesStore::open(dir, Arc::new(fetcher)).await?;

    match command {
        FavoritesCommand::List { search } => cmd_list(&store, search.as_deref()).await,
        FavoritesCommand::Show { id } => cmd_show(&store, &id).await,
        FavoritesCommand::Remove { id } => cmd_remove(&store, &id).await,
        FavoritesCommand::Clear { yes } => cmd_clear(&store, yes).await,
    }
}

/// Answer a command when nothing was ever cached
fn cmd_without_cache(command: FavoritesCommand) -> Result<(), CliError> {
    match command {
        FavoritesCommand::List { .. } => {
            print_info("No favorites cached");
            Ok(())
        }
        FavoritesCommand::Show { id } | FavoritesCommand::Remove { id } => {
            Err(CliError::NotFound(id))
        }
        FavoritesCommand::Clear { yes: false } => Err(CliError::ConfirmationRequired),
        FavoritesCommand::Clear { yes: true } => {
            print_info("No favorites cached");
            Ok(())
        }
    }
}

async fn cmd_list(store: &LocalFavoritesStore, search: Option<&str>) -> Result<(), CliError> {
    let mut favorites = store.list().await?;
    if let Some(query) = search {
        favorites.retain(|record| title_matches(&record.title, query));
    }
    print_favorite_list(&favorites);
    Ok(())
}

async fn cmd_show(store: &LocalFavoritesStore, query: &str) -> Result<(), CliError> {
    let id = resolve_id(&store.ids().await?, query)?;
    let record = store
        .get(&id)
        .await?
        .ok_or_else(|| CliError::NotFound(query.to_string()))?;

    let mut cached = Vec::new();
    for slot in AssetSlot::ALL {
        let size = store.load_asset(&id, slot).await?.map(|bytes| bytes.len());
        cached.push((slot, size));
    }
    print_favorite(&record, &cached);
    Ok(())
}

async fn cmd_remove(store: &LocalFavoritesStore, query: &str) -> Result<(), CliError> {
    let id = resolve_id(&store.ids().await?, query)?;
    if store.remove(&id).await? {
        print_success(&format!("Removed favorite {}", id.short()));
    } else {
        print_info(&format!("Favorite {} was already gone", id.short()));
    }
    Ok(())
}

async fn cmd_clear(store: &LocalFavoritesStore, yes: bool) -> Result<(), CliError> {
    if !yes {
        return Err(CliError::ConfirmationRequired);
    }
    let removed = store.clear().await?;
    print_success(&format!("Removed {removed} favorites"));
    Ok(())
}

/// Find a favorite by full id or unique prefix
fn resolve_id(ids: &[StoryId], query: &str) -> Result<StoryId, CliError> {
    if let Some(exact) = ids.iter().find(|id| id.as_str() == query) {
        return Ok(exact.clone());
    }

    let matches: Vec<&StoryId> = ids
        .iter()
        .filter(|id| id.as_str().starts_with(query))
        .collect();
    match matches.as_slice() {
        [] => Err(CliError::NotFound(query.to_string())),
        [only] => Ok((*only).clone()),
        many => Err(CliError::Ambiguous(query.to_string(), many.len())),
    }
}
