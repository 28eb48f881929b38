//! # Insight Scraper
//!
//! Incrementally scrapes the paginated IESE Insight article listing, skips
//! articles already present in the store, appends the new ones in batches and
//! optionally sends a digest of what was added. A separate pass crops stored
//! article images to 2:1 and re-hosts them.
//!
//! ## Usage
//!
//! ```sh
//! insight_scraper -c config.yaml scrape
//! insight_scraper -c config.yaml crop-images
//! ```
//!
//! ## Architecture
//!
//! The scrape follows a pipeline architecture:
//! 1. **Seeding**: Read every stored article URL into a per-run dedup index
//! 2. **Pagination**: Walk listing pages until an empty page, a failed fetch or the page cap
//! 3. **Extraction**: Read each entry, canonicalize its URL, drop known ones, fetch details
//! 4. **Commit**: Buffer new records and append them to the store in batches
//! 5. **Digest**: Render the new records and hand them to the configured notifiers

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod dedup;
mod error;
mod fetch;
mod identity;
mod images;
mod models;
mod notify;
mod pipeline;
mod scrapers;
mod sink;
mod store;
mod utils;

use cli::{Cli, Command};
use config::Config;
use error::RunError;
use fetch::build_fetcher;
use images::CloudinaryHost;
use models::ArticleRecord;
use notify::smtp::Credentials;
use pipeline::RunOutcome;
use store::AnyStore;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("insight_scraper starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.command, "Parsed CLI arguments");

    let config = Config::load(args.config.as_deref()).await?;
    let fetcher = build_fetcher(&config.fetch)?;
    let client = fetcher.inner().client().clone();
    let mut store = AnyStore::from_config(
        &config.store,
        client.clone(),
        args.airtable_api_key.as_deref(),
    )?;

    match args.command {
        Command::Scrape {
            no_notify,
            smtp_username,
            smtp_password,
        } => {
            if let (false, Some(dir)) = (no_notify, config.digest.output_dir.as_deref()) {
                ensure_writable_dir(dir).await?;
            }

            let credentials = match (smtp_username, smtp_password) {
                (Some(username), Some(password)) => Some(Credentials { username, password }),
                _ => None,
            };

            let summary = match pipeline::run(&config, &fetcher, &mut store).await {
                Ok(summary) => summary,
                Err(RunError::Sink {
                    unflushed,
                    committed,
                    source,
                }) => {
                    error!(added = committed.len(), unflushed, error = %source, "Scrape run failed");
                    if !no_notify {
                        send_digest(&config, &committed, credentials).await;
                    }
                    return Err(RunError::Sink {
                        unflushed,
                        committed,
                        source,
                    }
                    .into());
                }
                Err(e) => {
                    error!(added = 0, error = %e, "Scrape run failed");
                    return Err(e.into());
                }
            };

            match &summary.outcome {
                RunOutcome::Aborted(reason) => {
                    warn!(added = summary.added_count(), %reason, "Run ended early")
                }
                outcome => info!(
                    added = summary.added_count(),
                    duplicates = summary.duplicates,
                    malformed = summary.malformed,
                    flushes = summary.flushes,
                    last_page = summary.last_page,
                    %outcome,
                    "Run complete"
                ),
            }
            if summary.added.is_empty() {
                info!("No new articles found");
            } else {
                info!(count = summary.added_count(), "New article(s) added");
            }

            if no_notify {
                debug!("Digest disabled by --no-notify");
            } else {
                send_digest(&config, &summary.added, credentials).await;
            }
        }
        Command::CropImages {
            cloud_name,
            upload_preset,
        } => {
            let host = CloudinaryHost::new(
                client,
                cloud_name,
                upload_preset,
                config.images.folder.clone(),
            );
            let summary = images::process_rows(&mut store, &fetcher, &host).await?;
            info!(
                processed = summary.processed,
                failed = summary.failed,
                skipped = summary.skipped,
                "Image processing complete"
            );
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

/// Hand the records a run added to every configured notifier.
async fn send_digest(config: &Config, added: &[ArticleRecord], credentials: Option<Credentials>) {
    let now = Local::now();
    let notifiers = notify::from_config(&config.digest, credentials, now);
    notify::dispatch(&notifiers, added, config.digest.top_n, now).await;
}
