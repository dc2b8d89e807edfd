//! Bookmark sync CLI - classify captured posts and sync them to Notion.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bookmark_sync::classify::{AiClassifier, ClassificationCache, KeywordRule};
use bookmark_sync::store::{ContentStore, NotionClient};
use bookmark_sync::sync::{RetryQueue, SkipReason, SyncHistory, SyncOrchestrator, SyncOutcome};
use bookmark_sync::{ContentRecord, Settings, StatePaths};
use notify::Notifier;

/// Bookmark sync CLI - classify saved posts and persist them to Notion.
#[derive(Parser)]
#[command(name = "bookmark-sync")]
#[command(about = "Classify captured posts and sync them to Notion")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding settings, history, retry queue and cache
    #[arg(long, global = true, env = "BOOKMARK_SYNC_STATE_DIR", default_value = ".bookmark-sync")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sync one captured record (JSON file)
    Sync {
        /// Path to the record JSON
        record: PathBuf,
    },

    /// Retry every queued failed sync once
    Retry,

    /// Show recent sync attempts
    History {
        /// Limit results
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// List failed syncs waiting for retry
    Queue,

    /// Classify a record without syncing it
    Classify {
        /// Path to the record JSON
        record: PathBuf,
    },

    /// Verify Notion access and list categories
    Check,

    /// Inspect or extend the keyword rules
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// Print the effective keyword tables
    Show,

    /// Merge keyword tables from a JSON file into the settings
    Import {
        /// JSON array of {"category", "keywords"} objects
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("bookmark_sync=debug,ai=debug,notify=debug,info")
    } else {
        EnvFilter::new("bookmark_sync=info,warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let paths = StatePaths::new(cli.state_dir);
    let settings = Settings::load(&paths.settings())?.with_env()?;

    match cli.command {
        Commands::Sync { record } => {
            tracing::info!(record = %record.display(), "Starting sync");
            run_sync(&paths, &settings, &record).await
        }
        Commands::Retry => run_retry(&paths, &settings).await,
        Commands::History { limit } => run_history(&paths, limit).await,
        Commands::Queue => run_queue(&paths).await,
        Commands::Classify { record } => run_classify(&paths, &settings, &record).await,
        Commands::Check => run_check(&settings).await,
        Commands::Rules { action } => match action {
            RulesAction::Show => {
                run_rules_show(&settings);
                Ok(())
            }
            RulesAction::Import { file } => run_rules_import(&paths, &file),
        },
    }
}

/// Components shared by the sync-related commands.
struct Services {
    orchestrator: SyncOrchestrator,
    classifier: Arc<AiClassifier>,
    notifier: Arc<Notifier>,
}

fn build_classifier(paths: &StatePaths, settings: &Settings) -> Result<Arc<AiClassifier>> {
    let cache = match ClassificationCache::load(&paths.cache()) {
        Ok(cache) => cache,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable classification cache");
            ClassificationCache::new()
        }
    };

    let classifier = AiClassifier::new(
        settings.build_ai_provider()?,
        settings.rule_classifier(),
        settings.generation_settings(),
        Arc::new(cache),
    )?;
    Ok(Arc::new(classifier))
}

fn build_store(settings: &Settings) -> Result<Arc<NotionClient>> {
    let client = NotionClient::new(&settings.notion_config(), settings.request_timeout())?;
    Ok(Arc::new(client))
}

async fn build_services(paths: &StatePaths, settings: &Settings) -> Result<Services> {
    let classifier = build_classifier(paths, settings)?;
    let history = SyncHistory::open(paths.history()).await?;
    let queue = RetryQueue::open(paths.queue()).await?;
    let notifier = Arc::new(Notifier::from_env());

    let orchestrator = SyncOrchestrator::new(
        settings.sync_config(),
        build_store(settings)?,
        Arc::clone(&classifier),
        Arc::new(history),
        Arc::new(queue),
        Arc::clone(&notifier),
    );

    Ok(Services {
        orchestrator,
        classifier,
        notifier,
    })
}

fn save_cache(paths: &StatePaths, classifier: &AiClassifier) {
    if let Err(e) = classifier.cache().save(&paths.cache()) {
        tracing::warn!(error = %e, "Failed to save classification cache");
    }
}

fn load_record(path: &Path) -> Result<ContentRecord> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read record {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse record {}", path.display()))
}

async fn run_sync(paths: &StatePaths, settings: &Settings, record_path: &Path) -> Result<()> {
    let record = load_record(record_path)?;
    let services = build_services(paths, settings).await?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let outcome = services
        .orchestrator
        .sync_with_cancel(&record, &cancel)
        .await;
    ctrl_c.abort();
    save_cache(paths, &services.classifier);
    services.notifier.flush().await;

    match outcome {
        Ok(SyncOutcome::Synced(receipt)) => {
            println!(
                "{} {} → {} ({:.2})",
                "✅ Synced".green(),
                record.url,
                receipt
                    .classification
                    .category
                    .as_deref()
                    .unwrap_or("(none)")
                    .bold(),
                receipt.classification.confidence
            );
            println!("   Page: {}", receipt.item.url.unwrap_or(receipt.item.id));
            Ok(())
        }
        Ok(SyncOutcome::Skipped(SkipReason::AutoSyncDisabled)) => {
            println!("{}", "⏸️  Auto-sync is disabled, nothing synced".yellow());
            Ok(())
        }
        Ok(SyncOutcome::Skipped(SkipReason::MissingCredentials)) => {
            bail!("Notion API key and database ID must be configured")
        }
        Err(e) => {
            println!("{} {e}", "❌ Sync failed:".red());
            println!("   Queued for retry. Run `bookmark-sync retry` later.");
            Err(e.into())
        }
    }
}

async fn run_retry(paths: &StatePaths, settings: &Settings) -> Result<()> {
    let services = build_services(paths, settings).await?;
    let summary = services.orchestrator.retry_failed().await?;
    save_cache(paths, &services.classifier);
    services.notifier.flush().await;

    if summary.total == 0 {
        println!("No failed syncs to retry.");
        return Ok(());
    }

    println!(
        "🔁 Retry complete: {} succeeded, {} failed, {} total",
        summary.succeeded.to_string().green(),
        summary.failed.to_string().red(),
        summary.total
    );
    Ok(())
}

async fn run_history(paths: &StatePaths, limit: usize) -> Result<()> {
    let history = SyncHistory::open(paths.history()).await?;
    let entries = history.recent(limit).await;

    if entries.is_empty() {
        println!("No sync history.");
        return Ok(());
    }

    for entry in &entries {
        let status = if entry.success { "✅" } else { "❌" };
        println!(
            "{status} {} [{}] {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.category.as_deref().unwrap_or("-"),
            entry.url
        );
        println!("   {}", entry.text_preview.dimmed());
        if let Some(error) = &entry.error {
            println!("   {}", error.red());
        }
    }

    println!("\nTotal: {} entries", entries.len());
    Ok(())
}

async fn run_queue(paths: &StatePaths) -> Result<()> {
    let queue = RetryQueue::open(paths.queue()).await?;
    let items = queue.snapshot().await;

    if items.is_empty() {
        println!("Retry queue is empty.");
        return Ok(());
    }

    for item in &items {
        println!(
            "⏳ {} (retries: {}, queued {})",
            item.record.url,
            item.retry_count,
            item.timestamp.format("%Y-%m-%d %H:%M")
        );
        println!("   {}", item.error.red());
    }

    println!("\nPending: {}", items.len());
    Ok(())
}

async fn run_classify(paths: &StatePaths, settings: &Settings, record_path: &Path) -> Result<()> {
    let record = load_record(record_path)?;
    let classifier = build_classifier(paths, settings)?;

    let store = build_store(settings)?;
    let categories = if store.is_configured() {
        store.existing_categories().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to fetch categories");
            Vec::new()
        })
    } else {
        Vec::new()
    };

    let result = classifier.classify(&record, &categories).await;
    save_cache(paths, &classifier);

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_check(settings: &Settings) -> Result<()> {
    let gemini = if settings.gemini_api_key.is_some() {
        "configured".green()
    } else {
        "not configured (keyword rules only)".yellow()
    };
    println!("🤖 Gemini: {gemini}");

    if !settings.notion_config().is_complete() {
        bail!("Notion API key and database ID must be configured");
    }

    let store = build_store(settings)?;
    let database = store.get_database().await?;

    println!("📒 Notion database: {}", database.title.bold());
    if database.categories.is_empty() {
        println!("   No categories defined yet.");
    } else {
        println!("   Categories: {}", database.categories.join(", "));
    }
    Ok(())
}

fn run_rules_show(settings: &Settings) {
    let classifier = settings.rule_classifier();
    for rule in classifier.rules() {
        println!("{}: {}", rule.category.bold(), rule.keywords.join(", "));
    }
}

fn run_rules_import(paths: &StatePaths, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read rules from {}", file.display()))?;
    let rules: Vec<KeywordRule> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse rules in {}", file.display()))?;
    let count = rules.len();

    // Merge into the file contents, not the env-overridden view.
    let mut stored = Settings::load(&paths.settings())?;
    stored.merge_custom_rules(rules);
    stored.save(&paths.settings())?;

    println!("✅ Imported {count} keyword tables into {}", paths.settings().display());
    Ok(())
}
