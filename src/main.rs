//! Sumi-Tarama main entry point
//!
//! This is the command-line interface for the Sumi-Tarama crawl-and-rank engine.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use sumi_tarama::cache::query;
use sumi_tarama::config::load_config_with_hash;
use sumi_tarama::orchestrator::{self, StageSelection};
use sumi_tarama::ranker::{NormalizationMethod, RankerWeights};
use sumi_tarama::stages::StopFlag;
use sumi_tarama::storage::SqliteStorage;
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_PATH: &str = "./sumi.db";
const DEFAULT_INDEXER_INTERVAL_MINUTES: u64 = 7;
const DEFAULT_ANALYZER_INTERVAL_MINUTES: u64 = 10;
const DEFAULT_RESULT_COUNT: usize = 20;

/// Sumi-Tarama: a small-scale, Turkish-content-biased crawl-and-rank engine
///
/// Runs the IP scanner, URL-frontier resolver, and page crawler as
/// background stages sharing one SQLite corpus, plus a `query` subcommand
/// against the TF-IDF-plus-authority ranker.
#[derive(Parser, Debug)]
#[command(name = "sumi-tarama")]
#[command(version = "1.0.0")]
#[command(about = "A small-scale, Turkish-content-biased crawl-and-rank engine", long_about = None)]
struct Cli {
    /// Path to JSON configuration file
    #[arg(long, value_name = "CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Path to the secret file naming the storage backend (falls back to a
    /// local embedded SQLite database if missing or malformed)
    #[arg(long, value_name = "SECRET_FILE")]
    secret_file: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Launch the IP scanner stage
    #[arg(long)]
    ip: bool,

    /// Launch the URL-frontier resolver stage
    #[arg(long)]
    url: bool,

    /// Launch the page crawler stage
    #[arg(long)]
    page: bool,

    /// Launch every stage (IP scanner, URL resolver, page crawler)
    #[arg(long)]
    all: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a search query against the ranker (cached on repeat calls)
    Query {
        /// The free-text query
        #[arg(trailing_var_arg = true, required = true)]
        words: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!(hash = %hash, "configuration loaded");
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return Err(e.into());
        }
    };
    let _ = config_hash;

    let db_path = resolve_db_path(cli.secret_file.as_deref());

    if let Some(Command::Query { words }) = cli.command {
        return run_query(&db_path, &words);
    }

    let selection = if cli.all {
        StageSelection::all()
    } else {
        StageSelection {
            ip: cli.ip,
            url: cli.url,
            page: cli.page,
        }
    };

    if !(selection.ip || selection.url || selection.page) {
        tracing::warn!("no stage selected (--ip/--url/--page/--all); nothing to do");
        return Ok(());
    }

    let stop = StopFlag::new();
    let shutdown_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received, stopping stages");
            shutdown_stop.stop();
        }
    });

    orchestrator::run(
        db_path,
        config.crawler,
        config.system.machine_id,
        config.system.total_machines,
        selection,
        DEFAULT_INDEXER_INTERVAL_MINUTES,
        DEFAULT_ANALYZER_INTERVAL_MINUTES,
        stop,
    )
    .await?;

    Ok(())
}

/// Resolves the storage backend path from a secret file, falling back to a
/// local embedded SQLite database if the secret file is missing, unreadable,
/// or malformed.
fn resolve_db_path(secret_file: Option<&Path>) -> PathBuf {
    let Some(path) = secret_file else {
        return PathBuf::from(DEFAULT_DB_PATH);
    };

    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => match value.get("database_path").and_then(|v| v.as_str()) {
                Some(db_path) => PathBuf::from(db_path),
                None => {
                    tracing::warn!(path = %path.display(), "secret file missing database_path, using default");
                    PathBuf::from(DEFAULT_DB_PATH)
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "secret file is not valid JSON, using default");
                PathBuf::from(DEFAULT_DB_PATH)
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read secret file, using default");
            PathBuf::from(DEFAULT_DB_PATH)
        }
    }
}

fn run_query(db_path: &Path, words: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let raw_query = words.join(" ");
    let mut storage = SqliteStorage::new(db_path)?;
    let results = query(
        &mut storage,
        &raw_query,
        RankerWeights::default(),
        NormalizationMethod::default(),
        DEFAULT_RESULT_COUNT,
    )?;

    if results.is_empty() {
        println!("No results for \"{}\"", raw_query);
        return Ok(());
    }

    for (i, r) in results.iter().enumerate() {
        println!("{}. {} ({:.3})", i + 1, r.url, r.score);
        if !r.title.is_empty() {
            println!("   {}", r.title);
        }
        if !r.description.is_empty() {
            println!("   {}", r.description);
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_tarama=info,warn"),
            1 => EnvFilter::new("sumi_tarama=debug,info"),
            2 => EnvFilter::new("sumi_tarama=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
