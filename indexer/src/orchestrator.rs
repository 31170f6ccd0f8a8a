//! Wires the stage services to their queues and chains the stages together:
//! each stage is fed from persisted state when the previous queue drains.

use crate::jobs::{article_jobs, lemma_jobs};
use crate::postings::LemmaIndexer;
use crate::tagging::Tagging;
use crate::vectorize::Vectorizer;
use crate::weighting::Weighting;
use crawler::{Acquisition, Fetcher};
use lemmadex_core::queue::{JobHandler, JobQueues, QueueEvent, QueueName, Subscription, WorkerPool};
use lemmadex_core::{Result, Settings, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Tagging jobs for every untagged article.
pub fn enqueue_tagging(store: &Store, queues: &JobQueues) -> Result<usize> {
    let ids = store.articles.untagged_ids()?;
    let n = queues.get(QueueName::Tags).add_bulk(article_jobs(&ids)?)?;
    info!(jobs = n, "enqueued tagging");
    Ok(n)
}

/// Lemma jobs for every tagged article not yet in the index.
pub fn enqueue_indexing(store: &Store, queues: &JobQueues) -> Result<usize> {
    let ids = store.articles.unindexed_ids()?;
    let n = queues.get(QueueName::Lemmas).add_bulk(article_jobs(&ids)?)?;
    info!(jobs = n, "enqueued lemma indexing");
    Ok(n)
}

/// Weighting jobs for every distinct lemma.
pub fn enqueue_weighting(store: &Store, queues: &JobQueues) -> Result<usize> {
    let n = queues.get(QueueName::InverseIndex).add_bulk(lemma_jobs(store.lemmas.terms()?)?)?;
    info!(jobs = n, "enqueued weighting");
    Ok(n)
}

fn on_drained(store: &Store, queues: &JobQueues, queue: QueueName) -> Result<usize> {
    match queue {
        QueueName::Articles => enqueue_tagging(store, queues),
        QueueName::Tags => enqueue_indexing(store, queues),
        QueueName::Lemmas => enqueue_weighting(store, queues),
        QueueName::InverseIndex | QueueName::Training => Ok(0),
    }
}

async fn react(store: Store, queues: Arc<JobQueues>, mut events: Subscription, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(QueueEvent::Drained(queue)) => {
                    if let Err(e) = on_drained(&store, &queues, queue) {
                        error!(queue = %queue, error = %e, "failed to feed the next stage");
                    }
                }
                Some(QueueEvent::Failed { queue, job, .. }) => debug!(queue = %queue, job = %job, "job dropped"),
                None => break,
            },
            changed = shutdown.changed() => if changed.is_err() || *shutdown.borrow() { break; },
        }
    }
    events.unsubscribe();
}

pub struct Pipeline {
    store: Store,
    queues: Arc<JobQueues>,
    acquisition: Arc<Acquisition>,
    shutdown: watch::Sender<bool>,
    pools: Vec<WorkerPool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Registers a worker pool on every queue and starts chaining stages.
    /// Must be called inside a tokio runtime.
    pub fn start(store: Store, queues: Arc<JobQueues>, settings: &Settings, fetcher: Arc<dyn Fetcher>) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let acquisition = Arc::new(Acquisition::new(store.clone(), fetcher, settings));
        let variant = settings.idf_variant();
        let handlers: [(QueueName, Arc<dyn JobHandler>); 5] = [
            (QueueName::Articles, acquisition.clone()),
            (QueueName::Tags, Arc::new(Tagging::with_defaults(store.clone(), settings.tagger.classes()))),
            (QueueName::Lemmas, Arc::new(LemmaIndexer::new(store.clone()))),
            (QueueName::InverseIndex, Arc::new(Weighting::new(store.clone(), variant))),
            (QueueName::Training, Arc::new(Vectorizer::new(store.clone(), variant))),
        ];
        let poll = Duration::from_millis(settings.poll_interval_ms);
        let pools = handlers
            .into_iter()
            .map(|(name, handler)| WorkerPool::spawn(queues.get(name), handler, settings.concurrency, poll, rx.clone()))
            .collect();
        let tasks = vec![tokio::spawn(react(store.clone(), queues.clone(), queues.subscribe(), rx))];
        Self { store, queues, acquisition, shutdown, pools, tasks }
    }

    pub fn queues(&self) -> &Arc<JobQueues> { &self.queues }

    /// Feeds stages whose queue is empty from persisted backlog, so work left
    /// by a previous run resumes without waiting for a drain. Weighting is
    /// rerun over every lemma once any lemma total disagrees with its postings.
    pub fn catch_up(&self) -> Result<()> {
        if self.queues.get(QueueName::Tags).is_empty() {
            enqueue_tagging(&self.store, &self.queues)?;
        }
        if self.queues.get(QueueName::Lemmas).is_empty() {
            enqueue_indexing(&self.store, &self.queues)?;
        }
        if self.queues.get(QueueName::InverseIndex).is_empty() && self.store.lemmas.has_unreconciled()? {
            enqueue_weighting(&self.store, &self.queues)?;
        }
        Ok(())
    }

    pub async fn crawl(&self) -> anyhow::Result<usize> {
        self.acquisition.schedule(&self.queues.get(QueueName::Articles)).await
    }

    /// Schedules a crawl now and then every `every`.
    pub fn crawl_every(&mut self, every: Duration) {
        let acquisition = self.acquisition.clone();
        let articles = self.queues.get(QueueName::Articles);
        let mut shutdown = self.shutdown.subscribe();
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = acquisition.schedule(&articles).await {
                            error!(error = %e, "scheduled crawl failed");
                        }
                    }
                    changed = shutdown.changed() => if changed.is_err() || *shutdown.borrow() { break; },
                }
            }
        }));
    }

    /// Stops every pool after its in-flight jobs and flushes the store.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        for pool in self.pools {
            pool.join().await;
        }
        for task in self.tasks {
            let _ = task.await;
        }
        self.store.flush().await?;
        info!("pipeline stopped");
        Ok(())
    }
}
