//! The polling loop: one feed per tick, chosen by fetch age.
//!
//! A cycle selects the least recently fetched feed, marks it fetched, then
//! downloads and ingests it. Marking happens first so a feed that keeps
//! failing cannot monopolise the loop. Any error a cycle surfaces stops the
//! loop; skipped items inside a feed are not errors.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::Error;
use crate::feed::{ingest, FetchFeed, IngestReport};
use crate::storage::Database;
use crate::util::terminal_line;

const NAME_WIDTH: usize = 60;

/// What one completed cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub feed_id: Uuid,
    pub feed_name: String,
    pub ingest: IngestReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Cancellation arrived while the feed was downloading
    Cancelled,
}

/// Drives select, mark, fetch and ingest against a store and a fetcher.
pub struct Aggregator<F> {
    db: Database,
    fetcher: F,
}

impl<F: FetchFeed> Aggregator<F> {
    pub fn new(db: Database, fetcher: F) -> Self {
        Self { db, fetcher }
    }

    /// Runs one cycle per `interval` until `cancel` fires or a cycle fails.
    ///
    /// The first cycle starts immediately. A cycle that overruns the interval
    /// delays the next one rather than overlapping it, and ticks missed in the
    /// meantime are dropped.
    ///
    /// # Errors
    ///
    /// `Error::Configuration` for a zero interval, before any work starts.
    /// Otherwise the first error a cycle returns.
    pub async fn run(&self, interval: Duration, cancel: &CancellationToken) -> Result<(), Error> {
        poll_every(interval, cancel, move || self.scrape_once(cancel)).await
    }

    /// Performs a single cycle against the next feed in rotation.
    ///
    /// # Errors
    ///
    /// - `Error::Selection` if no feed can be chosen
    /// - `Error::Transport` / `Error::Decode` if the fetch fails (the feed stays marked)
    /// - `Error::Storage` / `Error::NotFound` on store failures
    pub async fn scrape_once(&self, cancel: &CancellationToken) -> Result<CycleOutcome, Error> {
        let feed = self
            .db
            .next_feed_to_fetch()
            .await
            .map_err(|e| Error::Selection(e.to_string()))?;

        self.db.mark_fetched(feed.id, Utc::now()).await?;

        println!("Fetching feed: {}", terminal_line(&feed.name, NAME_WIDTH));
        tracing::info!(feed_id = %feed.id, url = %feed.url, "Fetching feed");

        let parsed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(feed_id = %feed.id, "Fetch abandoned on cancellation");
                return Ok(CycleOutcome::Cancelled);
            }
            result = self.fetcher.fetch(&feed.url) => result.map_err(|e| {
                tracing::error!(feed_id = %feed.id, error = %e, "Feed fetch failed");
                Error::from(e)
            })?,
        };

        let report = ingest(&self.db, feed.id, &parsed.items).await?;
        tracing::info!(
            feed_id = %feed.id,
            items = parsed.items.len(),
            created = report.created,
            duplicates = report.duplicates,
            invalid = report.invalid,
            "Feed ingested"
        );

        Ok(CycleOutcome::Completed(CycleReport {
            feed_id: feed.id,
            feed_name: feed.name,
            ingest: report,
        }))
    }
}

/// Calls `cycle` on every tick of `interval` until `cancel` fires, a cycle
/// reports cancellation, or a cycle fails.
async fn poll_every<C, Fut>(
    interval: Duration,
    cancel: &CancellationToken,
    mut cycle: C,
) -> Result<(), Error>
where
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<CycleOutcome, Error>>,
{
    if interval.is_zero() {
        return Err(Error::Configuration(
            "polling interval must be greater than zero".to_string(),
        ));
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!(interval = ?interval, "Aggregator started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match cycle().await? {
            CycleOutcome::Completed(report) => {
                println!(
                    "Saved {} new posts from {}",
                    report.ingest.created,
                    terminal_line(&report.feed_name, NAME_WIDTH)
                );
            }
            CycleOutcome::Cancelled => break,
        }
    }

    tracing::info!("Aggregator stopped");
    Ok(())
}
