//! siteref-collect - fold recent channel links into the catalog
//!
//! Reads the monitored channel's history for the configured window, counts
//! every message carrying a URL and rewrites the snapshot export. Runs once by
//! default; `--watch` keeps running on the configured interval.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/siteref/websites.db (~/.local/share/siteref/websites.db)
//! - Transcripts: $XDG_DATA_HOME/siteref/channels/<channel_id>.jsonl
//! - Export: $XDG_DATA_HOME/siteref/websites_data.json
//! - Config: $XDG_CONFIG_HOME/siteref/config.toml (~/.config/siteref/config.toml)

mod process_lock;

use anyhow::{Context, Result};
use clap::Parser;
use process_lock::acquire_collect_guard;
use siteref_core::collect::{CollectResult, Scheduler, TranscriptSource};
use siteref_core::{CollectionJob, CollectionSettings, Config, Database};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "siteref-collect")]
#[command(about = "Collect website references from the monitored channel")]
#[command(version)]
struct Args {
    /// Watch mode - run on the configured interval instead of one-shot
    #[arg(short, long)]
    watch: bool,

    /// Override the channel to scan
    #[arg(long)]
    channel: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(channel) = args.channel {
        config.chat.channel_id = Some(channel);
    }

    let _log_guard =
        siteref_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("siteref-collect starting");

    let settings = CollectionSettings::from_config(&config).context("invalid configuration")?;
    if config.chat.token.is_none() {
        tracing::warn!("No chat token configured; reading local transcripts only");
    }

    // Resolve database path and enforce process-level exclusivity for it.
    let db_path = Config::database_path();
    let _collect_guard =
        acquire_collect_guard(&db_path).context("failed to acquire process lock")?;

    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let source = TranscriptSource::new(
        config.chat.transcript_dir(),
        config.chat.bot_identity.clone(),
    );
    println!("Database:    {}", db_path.display());
    println!("Transcripts: {}", source.dir().display());

    let job = CollectionJob::new(&db, &source, settings);

    if args.watch {
        run_watch_mode(&job, &config)
    } else {
        let result = job.run_once().context("collection run failed")?;
        print_summary(&result);
        Ok(())
    }
}

fn run_watch_mode(job: &CollectionJob<'_, TranscriptSource>, config: &Config) -> Result<()> {
    // Set up signal handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let interval = config
        .collection
        .interval()
        .context("invalid configuration")?;
    let scheduler = Scheduler::new(interval);
    println!(
        "Watch mode active (every {}h). Press Ctrl+C to stop.",
        config.collection.interval_hours
    );
    println!();

    let iterations = scheduler.run(&running, |iteration| {
        let started = chrono::Local::now();
        match job.run_once() {
            Ok(result) => {
                println!(
                    "[{}] Run {}: {} reference(s), {} new website(s), {} exported",
                    started.format("%Y-%m-%d %H:%M:%S"),
                    iteration,
                    result.references_recorded,
                    result.websites_created,
                    result.exported
                );
            }
            Err(e) => {
                // A failed run leaves the schedule intact
                tracing::error!(iteration, error = %e, "Collection run failed");
                eprintln!(
                    "[{}] Run {} failed: {}",
                    started.format("%Y-%m-%d %H:%M:%S"),
                    iteration,
                    e
                );
            }
        }
    });

    tracing::info!(iterations, "Watch mode stopped");
    println!("Watch mode stopped.");
    Ok(())
}

fn print_summary(result: &CollectResult) {
    println!("\nCollection complete:");
    println!("  Messages seen:       {}", result.items_seen);
    println!("  Skipped (own):       {}", result.skipped_self);
    println!("  Skipped (no link):   {}", result.skipped_ineligible);
    println!("  References recorded: {}", result.references_recorded);
    println!("  Websites created:    {}", result.websites_created);
    println!(
        "  Exported:            {} -> {}",
        result.exported,
        result.export_path.display()
    );
}
