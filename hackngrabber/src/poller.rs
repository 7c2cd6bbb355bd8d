use chrono::Utc;
use common::{FailurePolicy, ScraperConfig};
use sqlx::SqlitePool;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::error::GrabError;
use crate::extraction::{extract_stories, PageLayout, ScrapedItem};
use crate::fetching::Fetcher;
use crate::fingerprint::derive_id;
use crate::storage::{self, InsertReport, Story};

/// Where the poll loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
    Extracting,
    Storing,
    Sleeping,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Fetching => "fetching",
            Phase::Extracting => "extracting",
            Phase::Storing => "storing",
            Phase::Sleeping => "sleeping",
        };
        f.write_str(name)
    }
}

/// Outcome of one fetch-extract-store pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub extracted: usize,
    pub stored: InsertReport,
}

/// Give each scraped item its fingerprint and the scrape timestamp.
pub fn stories_from_items(items: Vec<ScrapedItem>, created: i64) -> Vec<Story> {
    items
        .into_iter()
        .map(|item| Story {
            id: derive_id(&item.title),
            title: item.title,
            url: item.url,
            created,
        })
        .collect()
}

/// Background scraper: fetch, extract, store, sleep, forever.
pub struct Poller {
    pool: SqlitePool,
    fetcher: Fetcher,
    layout: PageLayout,
    source_url: String,
    max_items: usize,
    interval: Duration,
    on_failure: FailurePolicy,
}

impl Poller {
    pub fn new(pool: SqlitePool, cfg: &ScraperConfig) -> Result<Self, GrabError> {
        Ok(Self {
            pool,
            fetcher: Fetcher::new(cfg.fetch_timeout_seconds, &cfg.user_agent)?,
            layout: PageLayout::new(&cfg.container_selector, &cfg.link_selector)?,
            source_url: cfg.source_url.clone(),
            max_items: cfg.max_items,
            interval: Duration::from_secs(cfg.interval_seconds),
            on_failure: cfg.on_failure,
        })
    }

    /// One poll cycle. Fetch and parse failures are returned; store failures
    /// are already logged inside `storage` and only show up in the report.
    pub async fn poll_once(&self) -> Result<CycleReport, GrabError> {
        debug!(phase = %Phase::Fetching, url = %self.source_url, "poller: phase change");
        let html = self.fetcher.fetch(&self.source_url).await?;

        debug!(phase = %Phase::Extracting, "poller: phase change");
        let items = extract_stories(&html, &self.layout, self.max_items)?;
        let extracted = items.len();
        let stories = stories_from_items(items, Utc::now().timestamp());

        debug!(phase = %Phase::Storing, count = stories.len(), "poller: phase change");
        let stored = storage::insert_many(&self.pool, &stories).await;

        Ok(CycleReport { extracted, stored })
    }

    /// Run until `shutdown` is notified. Shutdown is only observed between
    /// cycles; an in-flight fetch or insert runs to completion first.
    ///
    /// With `FailurePolicy::Stop` the first fetch/parse error ends the loop
    /// and is returned. With `FailurePolicy::Continue` it is logged and the
    /// next cycle starts after the usual interval.
    pub async fn run(self, shutdown: Arc<Notify>) -> Result<(), GrabError> {
        info!(
            url = %self.source_url,
            interval_secs = self.interval.as_secs(),
            policy = ?self.on_failure,
            "poller: starting"
        );
        debug!(phase = %Phase::Idle, "poller: phase change");

        loop {
            match self.poll_once().await {
                Ok(report) => info!(
                    extracted = report.extracted,
                    inserted = report.stored.inserted,
                    ignored = report.stored.ignored,
                    failed = report.stored.failed,
                    "poller: cycle complete"
                ),
                Err(e) => match self.on_failure {
                    FailurePolicy::Stop => {
                        error!("poller: cycle failed, stopping: {}", e);
                        return Err(e);
                    }
                    FailurePolicy::Continue => {
                        error!(
                            "poller: cycle failed, retrying in {}s: {}",
                            self.interval.as_secs(),
                            e
                        );
                    }
                },
            }

            debug!(phase = %Phase::Sleeping, "poller: phase change");
            select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.notified() => {
                    info!("poller: shutdown requested, exiting loop");
                    break;
                }
            }
        }

        Ok(())
    }
}
