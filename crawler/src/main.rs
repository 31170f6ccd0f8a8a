use anyhow::{Context, Result};
use clap::Parser;
use crawler::{Acquisition, HttpFetcher};
use lemmadex_core::queue::{JobQueues, QueueEvent, QueueName, WorkerPool};
use lemmadex_core::{Settings, Store};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Fetch the latest articles from the configured news sources into the store")]
struct Cli {
    /// sled database directory
    #[arg(long, env = "LEMMADEX_DB", default_value = "./data/lemmadex.sled")]
    db: PathBuf,
    /// Optional JSON settings file
    #[arg(long, env = "LEMMADEX_CONFIG")]
    config: Option<PathBuf>,
    /// Sources to crawl, overriding the settings file
    #[arg(long, value_delimiter = ',')]
    sources: Option<Vec<String>>,
    /// Stop scheduling once this many articles are stored
    #[arg(long)]
    goal: Option<usize>,
    /// Concurrent acquisition workers
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();
    let args = Cli::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    if let Some(sources) = args.sources {
        settings.sources = sources;
    }
    if let Some(goal) = args.goal {
        settings.article_goal = goal;
    }
    if let Some(n) = args.concurrency {
        settings.concurrency = n;
    }

    let store = Store::open(&args.db).with_context(|| format!("opening store at {}", args.db.display()))?;
    let queues = JobQueues::open(store.db(), settings.max_attempts)?;
    let articles = queues.get(QueueName::Articles);

    let fetcher = HttpFetcher::new(&settings.user_agent, Duration::from_secs(settings.timeout_secs))?;
    let acquisition = Arc::new(Acquisition::new(store.clone(), Arc::new(fetcher), &settings));
    let scheduled = acquisition.schedule(&articles).await?;
    let backlog = articles.len();
    info!(scheduled, backlog, "crawler: starting");
    if backlog == 0 {
        return Ok(());
    }

    let mut events = queues.subscribe();
    let (shutdown, rx) = watch::channel(false);
    let pool = WorkerPool::spawn(articles, acquisition, settings.concurrency, Duration::from_millis(settings.poll_interval_ms), rx);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(QueueEvent::Drained(QueueName::Articles)) | None => break,
                Some(QueueEvent::Failed { job, error, .. }) => warn!(url = %job, error = %error, "article dropped"),
                Some(_) => {}
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, finishing in-flight jobs");
                break;
            }
        }
    }
    events.unsubscribe();
    let _ = shutdown.send(true);
    pool.join().await;
    store.flush().await?;
    info!(stored = store.articles.count(), "crawler: done");
    Ok(())
}
