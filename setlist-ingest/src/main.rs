//! setlist-ingest - live-set project catalog ingest
//!
//! Thin command-line shell over the `setlist_ingest` library:
//! - `discover`: scan a folder, extract metadata, upsert into the catalog
//! - `inspect`: dump one set file's element tree as JSON
//! - `stats`: folder statistics without decoding anything
//! - `list`: print the catalog

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use setlist_common::config::{self, TomlConfig};
use setlist_ingest::services::{DiscoveryOptions, MemoryCacheStore, ProjectDiscovery};
use setlist_ingest::{db, FieldExtractor, ProjectStore, SqliteProjectStore};

/// Command-line arguments for setlist-ingest
#[derive(Parser, Debug)]
#[command(name = "setlist-ingest")]
#[command(about = "Catalog live-set project folders")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Catalog database path
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover projects and store them in the catalog
    Discover {
        /// Folder to scan (defaults to the configured root folder)
        root: Option<PathBuf>,

        /// Only look at the folder's immediate children
        #[arg(long)]
        no_recursive: bool,

        /// Maximum directory depth below the root
        #[arg(long)]
        max_depth: Option<usize>,

        /// Include backup-looking directories
        #[arg(long)]
        include_backups: bool,

        /// Re-extract projects already in the catalog
        #[arg(long)]
        update_existing: bool,

        /// Print the records without writing the catalog
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the parsed element tree of one set file as JSON
    Inspect {
        /// Set file (`.als`)
        path: PathBuf,
    },

    /// Folder statistics (project count, sizes, oldest and newest)
    Stats {
        root: Option<PathBuf>,
    },

    /// Print every catalogued project as JSON
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    // Logs go to stderr so JSON on stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("SETLIST_GIT_HASH"),
        profile = env!("SETLIST_BUILD_PROFILE"),
        "Starting setlist-ingest"
    );

    match args.command {
        Command::Discover {
            root,
            no_recursive,
            max_depth,
            include_backups,
            update_existing,
            dry_run,
        } => {
            let mut options = DiscoveryOptions::from(&config.discovery);
            options.recursive &= !no_recursive;
            options.include_backups |= include_backups;
            options.update_existing |= update_existing;
            if let Some(depth) = max_depth {
                options.max_depth = depth;
            }

            let root = config::resolve_root_folder(root.as_deref(), &config);
            run_discover(&config, args.database, root, options, dry_run).await
        }
        Command::Inspect { path } => {
            let document = tokio::task::spawn_blocking(move || {
                setlist_ingest::decode_and_parse(&path)
                    .with_context(|| format!("Failed to decode {}", path.display()))
            })
            .await??;
            print_json(&document)
        }
        Command::Stats { root } => {
            let root = config::resolve_root_folder(root.as_deref(), &config);
            let stats = tokio::task::spawn_blocking(move || setlist_ingest::project_stats(&root))
                .await?
                .context("Failed to scan root folder")?;
            print_json(&stats)
        }
        Command::List => {
            let store = open_store(&config, args.database).await?;
            print_json(&store.list().await?)
        }
    }
}

async fn run_discover(
    config: &TomlConfig,
    database: Option<PathBuf>,
    root: PathBuf,
    options: DiscoveryOptions,
    dry_run: bool,
) -> Result<()> {
    info!(root = %root.display(), "Root folder");

    let store = Arc::new(open_store(config, database).await?);
    let cache = match config.discovery.cache_capacity {
        Some(capacity) => MemoryCacheStore::with_capacity(capacity),
        None => MemoryCacheStore::new(),
    };

    let discovery = ProjectDiscovery::new(store.clone(), FieldExtractor::new(config.extraction.clone()))
        .with_cache(Arc::new(cache));

    let report = discovery
        .discover(&root, &options)
        .await
        .with_context(|| format!("Discovery failed for {}", root.display()))?;

    if !dry_run {
        for record in &report.succeeded {
            store
                .upsert(record)
                .await
                .with_context(|| format!("Failed to store {}", record.payload_path.display()))?;
        }
        info!(stored = report.succeeded.len(), "Catalog updated");
    }

    print_json(&report)
}

async fn open_store(config: &TomlConfig, database: Option<PathBuf>) -> Result<SqliteProjectStore> {
    let db_path = config::resolve_database_path(database.as_deref(), config);
    info!(path = %db_path.display(), "Database");

    let pool = db::init_database_pool(&db_path)
        .await
        .context("Failed to open catalog database")?;
    Ok(SqliteProjectStore::new(pool))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
