//! Article-Relay main entry point
//!
//! This is the command-line interface for the Article-Relay pipeline.

use anyhow::{bail, Context};
use article_relay::config::{load_config_with_hash, Config};
use article_relay::extract::HtmlExtractor;
use article_relay::http::HttpFetcher;
use article_relay::inspect::{
    apply_reset, load_statistics, print_item, print_listing, print_statistics, ContentView,
    ResetKind,
};
use article_relay::pipeline::{cancel_on_shutdown_signal, run_pipeline, Collaborators};
use article_relay::reddit::{RedditClient, RedditPublisher, SubredditSource};
use article_relay::storage::{open_storage, ItemRef, SqliteStorage, Storage};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Article-Relay: mirrors linked articles as threaded replies
///
/// Article-Relay watches subreddits for link posts, fetches the linked
/// articles, renders them as quoted text and posts them back as comments.
/// Every stage is persisted so work resumes after a restart.
#[derive(Parser, Debug)]
#[command(name = "article-relay")]
#[command(version = "1.0.0")]
#[command(about = "A durable article mirroring pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every stage worker until interrupted
    Run,

    /// Validate the configuration and show what would run
    Check,

    /// Show counters and queue depths
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored items, newest first
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,

        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Show one item
    Show {
        #[command(flatten)]
        item: ItemArg,

        /// Print the raw payload only
        #[arg(long, conflicts_with = "formatted")]
        raw: bool,

        /// Print the formatted text only
        #[arg(long)]
        formatted: bool,
    },

    /// Move an item back to "fetched" so it is processed again
    ResetProcessed(ItemArg),

    /// Move an item back to "processed" so it is published again
    ResetToProcessed(ItemArg),

    /// Move an item back to "discovered" so it is fetched again
    ResetItem(ItemArg),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct ItemArg {
    /// Item row id
    #[arg(long)]
    id: Option<i64>,

    /// Upstream id (e.g. t3_abc123)
    #[arg(long)]
    external_id: Option<String>,
}

impl ItemArg {
    fn to_ref(&self) -> anyhow::Result<ItemRef> {
        match (&self.id, &self.external_id) {
            (Some(id), _) => Ok(ItemRef::Id(*id)),
            (None, Some(external_id)) => Ok(ItemRef::ExternalId(external_id.clone())),
            (None, None) => bail!("either --id or --external-id is required"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Run => handle_run(Arc::new(config)).await,
        Command::Check => handle_check(&config),
        Command::Stats { json } => handle_stats(&config, json),
        Command::List { limit, offset } => handle_list(&config, limit, offset),
        Command::Show {
            item,
            raw,
            formatted,
        } => {
            let view = match (raw, formatted) {
                (true, _) => ContentView::Raw,
                (_, true) => ContentView::Formatted,
                _ => ContentView::Summary,
            };
            handle_show(&config, &item.to_ref()?, view)
        }
        Command::ResetProcessed(item) => handle_reset(&config, ResetKind::Processed, &item),
        Command::ResetToProcessed(item) => handle_reset(&config, ResetKind::ToProcessed, &item),
        Command::ResetItem(item) => handle_reset(&config, ResetKind::Item, &item),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("article_relay=info,warn"),
            1 => EnvFilter::new("article_relay=debug,info"),
            2 => EnvFilter::new("article_relay=trace,debug"),
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

fn open(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.storage.database_path);
    open_storage(path).with_context(|| format!("failed to open database {}", path.display()))
}

/// Handles `run`: spawns every stage worker and waits for SIGTERM or Ctrl-C
async fn handle_run(config: Arc<Config>) -> anyhow::Result<()> {
    let storage: Arc<dyn Storage> = Arc::new(open(&config)?);

    let reddit = Arc::new(RedditClient::new(&config.reddit)?);
    let collaborators = Collaborators {
        source: Arc::new(SubredditSource::new(
            Arc::clone(&reddit),
            &config.reddit.subreddits,
            config.discover.skip_existing,
        )),
        fetcher: Arc::new(HttpFetcher::new(&config.fetch)?),
        extractor: Arc::new(HtmlExtractor::new()),
        publisher: Arc::new(RedditPublisher::new(reddit)),
    };

    tracing::info!(
        "Watching {} subreddits with {} banned domain patterns",
        config.reddit.subreddits.len(),
        config.reddit.banned_domains.len()
    );

    let cancel = CancellationToken::new();
    cancel_on_shutdown_signal(cancel.clone()).context("failed to install signal handlers")?;

    run_pipeline(&config, storage, collaborators, cancel).await?;
    tracing::info!("All workers stopped");
    Ok(())
}

/// Handles `check`: validates config and shows what would run
fn handle_check(config: &Config) -> anyhow::Result<()> {
    println!("=== Article-Relay Configuration ===\n");

    println!("Storage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Batch size: {}", config.storage.batch_size);

    println!("\nReddit:");
    println!("  User: {}", config.reddit.username);
    println!("  Subreddits: {}", config.reddit.subreddits.join(", "));
    println!("  Pinned in: {}", config.reddit.distinguishable.join(", "));
    println!(
        "  Banned domain patterns: {}",
        config.reddit.banned_domains.len()
    );

    println!("\nStages:");
    let stages = [
        ("discover", config.discover.timing()),
        ("fetch", config.fetch.timing()),
        ("process", config.process.timing()),
        ("publish", config.publish.timing()),
        ("cleanup", config.cleanup.timing()),
    ];
    for (name, timing) in stages {
        println!(
            "  {:<9} every {}s (after errors {}s)",
            name,
            timing.interval.as_secs(),
            timing.error_interval.as_secs()
        );
    }
    println!(
        "  Fetch retries: {} every {}s",
        config.fetch.max_retries, config.fetch.retry_delay_secs
    );
    println!("  Max reply length: {}", config.publish.max_length);

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles `stats`: shows statistics from the database
fn handle_stats(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open(config)?;
    let stats = load_statistics(&storage, Utc::now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Database: {}\n", config.storage.database_path);
        print_statistics(&stats);
    }
    Ok(())
}

fn handle_list(config: &Config, limit: u32, offset: u32) -> anyhow::Result<()> {
    let storage = open(config)?;
    let items = storage.list_items(Some(limit), Some(offset))?;
    if items.is_empty() {
        println!("No items stored.");
    } else {
        print_listing(&items);
    }
    Ok(())
}

fn handle_show(config: &Config, item: &ItemRef, view: ContentView) -> anyhow::Result<()> {
    let storage = open(config)?;
    match storage.get_item(item)? {
        Some(detail) => print_item(&detail, view),
        None => bail!("item {} not found", item),
    }
    Ok(())
}

fn handle_reset(config: &Config, kind: ResetKind, item: &ItemArg) -> anyhow::Result<()> {
    let storage = open(config)?;
    let item = item.to_ref()?;
    if !apply_reset(&storage, kind, &item, Utc::now())? {
        bail!("item {} not found", item);
    }
    println!("✓ Item {}: {}", item, kind.describe());
    Ok(())
}
