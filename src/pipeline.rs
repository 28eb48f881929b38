//! Incremental scrape run: paginate, extract, dedup, commit.
//!
//! ```text
//! Fetching(1) ──entries──▶ Fetching(2) ──entries──▶ ... ──cap──▶ Done
//!      │                        │
//!      │ no entries             │ GET failed
//!      ▼                        ▼
//!     Done               Aborted(reason)
//! ```
//!
//! Every page is handled in three steps:
//!
//! 1. Parse the listing; skip malformed entries
//! 2. Admit new canonical URLs into the [`DedupIndex`] in listing order
//! 3. Fetch details for admitted entries (optionally a few at a time, results
//!    kept in listing order) and push the records into the [`CommitSink`]
//!
//! Whatever state the driver ends in, the sink is flushed before returning.

use crate::config::Config;
use crate::dedup::DedupIndex;
use crate::error::{ExtractError, RunError, StoreError};
use crate::fetch::Fetcher;
use crate::models::{ArticleRecord, ListingEntry};
use crate::scrapers::insight::{fetch_article_details, parse_listing};
use crate::sink::CommitSink;
use crate::store::Repository;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// State of the pagination driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    Fetching(u32),
    Done,
    Aborted(String),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A page had no entries.
    Exhausted,
    /// The configured page cap was reached.
    PageCap,
    /// A listing page could not be fetched.
    Aborted(String),
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Exhausted => write!(f, "end of listing"),
            RunOutcome::PageCap => write!(f, "page cap reached"),
            RunOutcome::Aborted(reason) => write!(f, "aborted: {reason}"),
        }
    }
}

/// What one run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    /// The last page the driver requested.
    pub last_page: u32,
    /// Newly committed records, in commit order.
    pub added: Vec<ArticleRecord>,
    pub duplicates: usize,
    pub malformed: usize,
    pub flushes: usize,
}

impl RunSummary {
    pub fn added_count(&self) -> usize {
        self.added.len()
    }
}

#[derive(Debug, Default)]
struct Counters {
    duplicates: usize,
    malformed: usize,
}

/// Decide the next state after a page was fetched and processed.
fn next_state(page: u32, entries: usize, max_pages: u32) -> PageState {
    if entries == 0 || page >= max_pages {
        PageState::Done
    } else {
        PageState::Fetching(page + 1)
    }
}

/// Keep the well-formed entries of a page that the index admits.
fn admit_entries(
    page: u32,
    results: Vec<Result<ListingEntry, ExtractError>>,
    index: &mut DedupIndex,
    counters: &mut Counters,
) -> Vec<ListingEntry> {
    let mut admitted = Vec::new();
    for (position, result) in results.into_iter().enumerate() {
        match result {
            Ok(entry) => {
                if index.should_admit(&entry.article_url) {
                    debug!(page, url = %entry.article_url, "Admitted new article");
                    admitted.push(entry);
                } else {
                    counters.duplicates += 1;
                    debug!(page, url = %entry.article_url, "Skipping known article");
                }
            }
            Err(e) => {
                counters.malformed += 1;
                warn!(page, position, error = %e, "Skipping listing entry");
            }
        }
    }
    admitted
}

/// End the run on a failed flush, keeping what earlier flushes committed.
fn sink_failure<R: Repository>(sink: CommitSink<'_, R>, source: StoreError) -> RunError {
    let unflushed = sink.pending();
    let committed = sink.into_committed();
    error!(committed = committed.len(), unflushed, error = %source, "Stopping run on failed commit");
    RunError::Sink {
        unflushed,
        committed,
        source,
    }
}

/// Run one incremental scrape against `store`.
///
/// Listing and detail-page failures never surface as errors: a failed listing
/// fetch ends pagination with [`RunOutcome::Aborted`], a failed detail fetch
/// yields a record without date and author. Only store failures are returned.
///
/// # Errors
///
/// [`RunError::Seed`] if existing URLs cannot be read, [`RunError::Sink`] if
/// a batch cannot be written. The latter carries the records committed
/// before the failure so the caller can still report them.
#[instrument(level = "info", skip_all, fields(site = %config.site.base_url))]
pub async fn run<F, R>(config: &Config, fetcher: &F, store: &mut R) -> Result<RunSummary, RunError>
where
    F: Fetcher,
    R: Repository,
{
    let t0 = Instant::now();
    let origin = config.site.origin()?;

    let existing = store.existing_urls().await.map_err(RunError::Seed)?;
    let mut index = DedupIndex::seeded(&existing);
    info!(existing = existing.len(), indexed = index.len(), "Seeded dedup index");

    let mut sink = CommitSink::new(store, config.batch_size);
    let mut counters = Counters::default();
    let mut state = PageState::Fetching(1);
    let mut last_page = 1;
    let mut outcome = RunOutcome::Exhausted;

    while let PageState::Fetching(page) = state {
        last_page = page;
        let url = config.site.listing_page_url(page);

        let html = match fetcher.fetch_text(&url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(page, %url, error = %e, "Listing fetch failed; stopping pagination");
                state = PageState::Aborted(e.to_string());
                continue;
            }
        };

        let results = parse_listing(&html, &origin);
        let entries = results.len();
        info!(page, entries, "Parsed listing page");

        let admitted = admit_entries(page, results, &mut index, &mut counters);

        let records: Vec<ArticleRecord> = stream::iter(admitted)
            .map(|entry| async move {
                let details = fetch_article_details(fetcher, &entry.article_url).await;
                ArticleRecord::from_parts(entry, details)
            })
            .buffered(config.detail_concurrency)
            .collect()
            .await;

        for record in records {
            info!(title = %record.title, "Queued");
            if let Err(source) = sink.push(record).await {
                return Err(sink_failure(sink, source));
            }
        }

        state = next_state(page, entries, config.site.max_pages);
        if state == PageState::Done && entries > 0 {
            outcome = RunOutcome::PageCap;
        }
    }

    if let PageState::Aborted(reason) = state {
        outcome = RunOutcome::Aborted(reason);
    }

    if let Err(source) = sink.flush_remaining().await {
        return Err(sink_failure(sink, source));
    }

    let flushes = sink.flushes();
    let added = sink.into_committed();
    info!(
        added = added.len(),
        duplicates = counters.duplicates,
        malformed = counters.malformed,
        flushes,
        last_page,
        %outcome,
        elapsed_ms = t0.elapsed().as_millis(),
        "Scrape run finished"
    );

    Ok(RunSummary {
        outcome,
        last_page,
        added,
        duplicates: counters.duplicates,
        malformed: counters.malformed,
        flushes,
    })
}
