//! Article acquisition: listing discovery, scheduling, fetch + persist.

use crate::error::AcquireError;
use crate::fetch::Fetcher;
use crate::source::Source;
use async_trait::async_trait;
use lemmadex_core::model::{ArticleId, NewArticle};
use lemmadex_core::queue::{Job, JobHandler, NewJob, Queue};
use lemmadex_core::{Settings, Store};
use rand::Rng;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Payload of an `Articles` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleJob {
    pub source: Source,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    Created(ArticleId),
    /// Already stored, before fetching or by a concurrent insert.
    Skipped,
}

pub struct Acquisition {
    store: Store,
    fetcher: Arc<dyn Fetcher>,
    delay_ms: RangeInclusive<u64>,
    article_goal: usize,
    sources: Vec<Source>,
}

impl Acquisition {
    pub fn new(store: Store, fetcher: Arc<dyn Fetcher>, settings: &Settings) -> Self {
        let sources = settings
            .sources
            .iter()
            .filter_map(|name| {
                let source = Source::from_name(name);
                if source.is_none() {
                    warn!(source = %name, "ignoring unknown source");
                }
                source
            })
            .collect();
        Self { store, fetcher, delay_ms: settings.delay_range(), article_goal: settings.article_goal, sources }
    }

    pub async fn acquire(&self, job: &ArticleJob) -> Result<Acquired, AcquireError> {
        if self.store.articles.exists(&job.url)? {
            info!(url = %job.url, "article already stored, skipping");
            return Ok(Acquired::Skipped);
        }
        let wait = rand::thread_rng().gen_range(self.delay_ms.clone());
        sleep(Duration::from_millis(wait)).await;

        let html = self.fetcher.fetch(&job.url).await?;
        let (header, body) = job.source.extract(&html, &job.url)?;
        match self.store.articles.create(NewArticle { url: job.url.clone(), header, body })? {
            Some(article) => {
                info!(article_id = article.id, url = %job.url, source = %job.source, "stored article");
                Ok(Acquired::Created(article.id))
            }
            None => {
                info!(url = %job.url, "article stored concurrently, skipping");
                Ok(Acquired::Skipped)
            }
        }
    }

    /// Canonical article URLs on a source's listing page not yet stored.
    pub async fn discover(&self, source: Source) -> Result<Vec<String>, AcquireError> {
        let listing = source.listing_url();
        let html = self.fetcher.fetch(listing).await?;
        let page = Url::parse(listing).map_err(|_| AcquireError::Rejected { url: listing.to_string(), reason: "invalid url".into() })?;
        let mut fresh = Vec::new();
        for url in source.candidate_urls(&html, &page) {
            if !self.store.articles.exists(&url)? {
                fresh.push(url);
            }
        }
        debug!(source = %source, fresh = fresh.len(), "listing scanned");
        Ok(fresh)
    }

    /// Enqueues acquisition jobs for every configured source, capped so the
    /// stored plus enqueued count stays within the article goal.
    pub async fn schedule(&self, queue: &Queue) -> anyhow::Result<usize> {
        let mut budget = self.article_goal.saturating_sub(self.store.articles.count());
        if budget == 0 {
            info!(goal = self.article_goal, "article goal reached, nothing scheduled");
            return Ok(0);
        }
        let mut seen = HashSet::new();
        let mut jobs = Vec::new();
        for &source in &self.sources {
            let urls = match self.discover(source).await {
                Ok(urls) => urls,
                Err(e) => {
                    warn!(source = %source, error = %e, "listing page unavailable");
                    continue;
                }
            };
            for url in urls {
                if budget == 0 {
                    break;
                }
                if seen.insert(url.clone()) {
                    jobs.push(NewJob::new(url.clone(), &ArticleJob { source, url })?);
                    budget -= 1;
                }
            }
        }
        let scheduled = queue.add_bulk(jobs)?;
        info!(scheduled, "scheduled article acquisition");
        Ok(scheduled)
    }
}

#[async_trait]
impl JobHandler for Acquisition {
    async fn handle(&self, job: &Job) -> anyhow::Result<()> {
        let payload: ArticleJob = job.payload()?;
        match self.acquire(&payload).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.is_integrity() {
                    warn!(kind = "integrity", url = %payload.url, error = %e, "article page has no content");
                }
                Err(e.into())
            }
        }
    }
}
