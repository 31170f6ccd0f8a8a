//! Durable named job queues on top of sled, with worker pools.
//!
//! Delivery is at-least-once: a claimed job is only removed once its handler
//! finishes, and jobs left `running` by a crashed process go back to
//! `pending` when the queues are reopened. Failed jobs are re-enqueued until
//! `max_attempts` is reached, then dropped.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sled::transaction::{TransactionError, TransactionResult};
use sled::{Db, Tree};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    Articles,
    Tags,
    Lemmas,
    InverseIndex,
    Training,
}

impl QueueName {
    pub const ALL: [QueueName; 5] = [QueueName::Articles, QueueName::Tags, QueueName::Lemmas, QueueName::InverseIndex, QueueName::Training];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueName::Articles => "Articles",
            QueueName::Tags => "Tags",
            QueueName::Lemmas => "Lemmas",
            QueueName::InverseIndex => "InverseIndex",
            QueueName::Training => "Training",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum JobState {
    Pending,
    Running,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
    pub payload: serde_json::Value,
    /// Failed attempts so far.
    pub attempts: u32,
    state: JobState,
}

impl Job {
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub name: String,
    pub payload: serde_json::Value,
}

impl NewJob {
    pub fn new<T: Serialize>(name: impl Into<String>, payload: &T) -> Result<Self> {
        Ok(Self { name: name.into(), payload: serde_json::to_value(payload)? })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    /// The queue ran empty after processing at least one job.
    Drained(QueueName),
    /// A job exhausted its attempts and was dropped.
    Failed { queue: QueueName, job: String, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    Retrying { attempt: u32 },
    Dropped,
}

pub struct Queue {
    name: QueueName,
    db: Db,
    tree: Tree,
    max_attempts: u32,
    notify: Notify,
    events: broadcast::Sender<QueueEvent>,
    running: AtomicUsize,
    finished: AtomicUsize, // since the last drained event
}

impl Queue {
    fn open(db: &Db, name: QueueName, max_attempts: u32, events: broadcast::Sender<QueueEvent>) -> Result<Self> {
        let queue = Self {
            name,
            db: db.clone(),
            tree: db.open_tree(format!("queue:{}", name.as_str()))?,
            max_attempts: max_attempts.max(1),
            notify: Notify::new(),
            events,
            running: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        };
        let recovered = queue.recover()?;
        if recovered > 0 {
            info!(queue = %name, recovered, "re-queued jobs left running by a previous process");
        }
        Ok(queue)
    }

    pub fn name(&self) -> QueueName { self.name }

    fn recover(&self) -> Result<usize> {
        let mut recovered = 0;
        for item in self.tree.iter() {
            let (key, bytes) = item?;
            let mut job: Job = serde_json::from_slice(&bytes)?;
            if job.state == JobState::Running {
                job.state = JobState::Pending;
                self.tree.insert(key, serde_json::to_vec(&job)?)?;
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    fn encode_new(&self, name: String, payload: serde_json::Value, attempts: u32) -> Result<(u64, Vec<u8>)> {
        let id = self.db.generate_id()?;
        let job = Job { id, name, payload, attempts, state: JobState::Pending };
        Ok((id, serde_json::to_vec(&job)?))
    }

    pub fn add(&self, job: NewJob) -> Result<u64> {
        let (id, bytes) = self.encode_new(job.name, job.payload, 0)?;
        self.tree.insert(id.to_be_bytes(), bytes)?;
        self.notify.notify_waiters();
        Ok(id)
    }

    pub fn add_bulk(&self, jobs: Vec<NewJob>) -> Result<usize> {
        let count = jobs.len();
        if count == 0 {
            return Ok(0);
        }
        let mut batch = sled::Batch::default();
        for job in jobs {
            let (id, bytes) = self.encode_new(job.name, job.payload, 0)?;
            batch.insert(&id.to_be_bytes()[..], bytes);
        }
        self.tree.apply_batch(batch)?;
        self.notify.notify_waiters();
        debug!(queue = %self.name, count, "enqueued jobs");
        Ok(count)
    }

    /// Atomically moves the oldest pending job to `running`.
    pub fn claim(&self) -> Result<Option<Job>> {
        for item in self.tree.iter() {
            let (key, bytes) = item?;
            let job: Job = serde_json::from_slice(&bytes)?;
            if job.state != JobState::Pending {
                continue;
            }
            let claimed = Job { state: JobState::Running, ..job };
            if self.tree.compare_and_swap(&key, Some(&bytes), Some(serde_json::to_vec(&claimed)?))?.is_ok() {
                self.running.fetch_add(1, Ordering::SeqCst);
                return Ok(Some(claimed));
            }
        }
        Ok(None)
    }

    fn settle(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
        self.running.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn complete(&self, job: &Job) -> Result<()> {
        let removed = self.tree.remove(job.id.to_be_bytes());
        self.settle();
        removed?;
        Ok(())
    }

    /// Re-enqueues the job at the back of the queue, or drops it once the
    /// attempt budget is spent.
    pub fn fail(&self, job: &Job, reason: &str) -> Result<FailOutcome> {
        let outcome = self.requeue_or_drop(job, reason);
        self.settle();
        outcome
    }

    // The retry must be pending again before the job counts as settled, or an
    // idle worker could report the queue drained in between.
    fn requeue_or_drop(&self, job: &Job, reason: &str) -> Result<FailOutcome> {
        let attempts = job.attempts + 1;
        let old_key = job.id.to_be_bytes();
        if attempts >= self.max_attempts {
            self.tree.remove(old_key)?;
            let _ = self.events.send(QueueEvent::Failed { queue: self.name, job: job.name.clone(), error: reason.to_string() });
            return Ok(FailOutcome::Dropped);
        }
        let (id, bytes) = self.encode_new(job.name.clone(), job.payload.clone(), attempts)?;
        let new_key = id.to_be_bytes();
        let moved: TransactionResult<()> = self.tree.transaction(|tree| {
            tree.remove(&old_key[..])?;
            tree.insert(&new_key[..], &bytes[..])?;
            Ok(())
        });
        moved.map_err(|e| match e {
            TransactionError::Storage(e) => Error::Store(e),
            TransactionError::Abort(()) => Error::Invalid("retry aborted".into()),
        })?;
        self.notify.notify_waiters();
        Ok(FailOutcome::Retrying { attempt: attempts + 1 })
    }

    pub fn len(&self) -> usize { self.tree.len() }

    pub fn is_empty(&self) -> bool { self.tree.is_empty() }

    pub fn pending(&self) -> Result<usize> {
        let mut pending = 0;
        for item in self.tree.iter().values() {
            let job: Job = serde_json::from_slice(&item?)?;
            if job.state == JobState::Pending { pending += 1; }
        }
        Ok(pending)
    }

    /// Removes every pending job; running jobs are left alone.
    pub fn drain(&self) -> Result<usize> {
        let mut removed = 0;
        for item in self.tree.iter() {
            let (key, bytes) = item?;
            let job: Job = serde_json::from_slice(&bytes)?;
            if job.state == JobState::Pending
                && self.tree.compare_and_swap(&key, Some(&bytes), None as Option<&[u8]>)?.is_ok()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    // Retries are written before `settle`, so once `running` reads zero the
    // tree reflects every re-enqueued job.
    fn note_idle(&self) {
        if self.running.load(Ordering::SeqCst) == 0 && self.tree.is_empty() && self.finished.swap(0, Ordering::SeqCst) > 0 {
            info!(queue = %self.name, "queue is empty");
            let _ = self.events.send(QueueEvent::Drained(self.name));
        }
    }

    async fn wait(&self, poll: Duration) {
        let _ = tokio::time::timeout(poll, self.notify.notified()).await;
    }
}

/// The fixed queue topology, one durable queue per pipeline stage.
pub struct JobQueues {
    queues: Vec<Arc<Queue>>,
    events: broadcast::Sender<QueueEvent>,
}

impl JobQueues {
    pub fn open(db: &Db, max_attempts: u32) -> Result<Self> {
        let (events, _) = broadcast::channel(256);
        let queues = QueueName::ALL
            .iter()
            .map(|name| Queue::open(db, *name, max_attempts, events.clone()).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { queues, events })
    }

    pub fn get(&self, name: QueueName) -> Arc<Queue> {
        self.queues[name as usize].clone()
    }

    /// Flushes pending jobs across every queue; in-flight jobs finish.
    pub fn drain_all(&self) -> Result<usize> {
        let mut removed = 0;
        for queue in &self.queues {
            let n = queue.drain()?;
            if n > 0 { info!(queue = %queue.name(), removed = n, "drained pending jobs"); }
            removed += n;
        }
        Ok(removed)
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription { rx: Some(self.events.subscribe()) }
    }
}

pub struct Subscription {
    rx: Option<broadcast::Receiver<QueueEvent>>,
}

impl Subscription {
    /// Next event, or `None` once unsubscribed or the queues are gone.
    pub async fn recv(&mut self) -> Option<QueueEvent> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => warn!(skipped, "queue event subscriber lagged"),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(&mut self) { self.rx = None; }
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> anyhow::Result<()>;
}

pub struct WorkerPool {
    queue: QueueName,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(queue: Arc<Queue>, handler: Arc<dyn JobHandler>, concurrency: usize, poll: Duration, shutdown: watch::Receiver<bool>) -> Self {
        let name = queue.name();
        let workers = (0..concurrency.max(1))
            .map(|worker| tokio::spawn(work(worker, queue.clone(), handler.clone(), poll, shutdown.clone())))
            .collect();
        info!(queue = %name, concurrency, "registered worker pool");
        Self { queue: name, workers }
    }

    /// Waits for every worker to stop; in-flight jobs run to completion.
    pub async fn join(self) {
        for handle in self.workers {
            if let Err(e) = handle.await {
                error!(queue = %self.queue, error = %e, "worker task panicked");
            }
        }
    }
}

async fn work(worker: usize, queue: Arc<Queue>, handler: Arc<dyn JobHandler>, poll: Duration, mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        let job = match queue.claim() {
            Ok(Some(job)) => job,
            Ok(None) => {
                queue.note_idle();
                tokio::select! {
                    _ = queue.wait(poll) => {}
                    changed = shutdown.changed() => if changed.is_err() { break; },
                }
                continue;
            }
            Err(e) => {
                error!(queue = %queue.name(), worker, error = %e, "failed to claim job");
                tokio::time::sleep(poll).await;
                continue;
            }
        };

        let start = Instant::now();
        match handler.handle(&job).await {
            Ok(()) => match queue.complete(&job) {
                Ok(()) => debug!(queue = %queue.name(), worker, job = %job.name, took_ms = start.elapsed().as_millis() as u64, "job completed"),
                Err(e) => error!(queue = %queue.name(), job = %job.name, error = %e, "failed to remove completed job"),
            },
            Err(err) => {
                let reason = format!("{err:#}");
                match queue.fail(&job, &reason) {
                    Ok(FailOutcome::Retrying { attempt }) => {
                        warn!(queue = %queue.name(), job = %job.name, attempt, error = %reason, "job failed, will retry")
                    }
                    Ok(FailOutcome::Dropped) => {
                        error!(queue = %queue.name(), job = %job.name, attempts = job.attempts + 1, error = %reason, "job failed after max attempts")
                    }
                    Err(e) => error!(queue = %queue.name(), job = %job.name, error = %e, "failed to record job failure"),
                }
            }
        }
    }
    debug!(queue = %queue.name(), worker, "worker stopped");
}
