use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crawler::HttpFetcher;
use indexer::export::{export, ExportKind};
use indexer::shell::{Command, Shell};
use indexer::vectorize::Vectorizer;
use indexer::Pipeline;
use lemmadex_core::queue::{JobQueues, QueueEvent, QueueName, WorkerPool};
use lemmadex_core::{Settings, Store};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query the lemma inverted index and the document classifier", long_about = None)]
struct Cli {
    /// sled database directory
    #[arg(long, env = "LEMMADEX_DB", default_value = "./data/lemmadex.sled", global = true)]
    db: PathBuf,
    /// Optional JSON settings file
    #[arg(long, env = "LEMMADEX_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Directory receiving `export` output
    #[arg(long, default_value = ".", global = true)]
    export_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every pipeline stage with the interactive shell
    Run {
        /// Do not crawl at startup or on the timer
        #[arg(long, default_value_t = false)]
        no_crawl: bool,
    },
    /// Rebuild the classifier corpus and vectorize it
    Train { path: PathBuf },
    /// Print the category of a text file
    Classify { file: PathBuf },
    /// Look up lemmas containing any of the terms
    Query { terms: Vec<String> },
    /// Run the query benchmark
    Test,
    /// Export one entity type: article, lemma, stem, document or xml
    Export { kind: ExportKind },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    let store = Store::open(&cli.db).with_context(|| format!("opening store at {}", cli.db.display()))?;
    let queues = Arc::new(JobQueues::open(store.db(), settings.max_attempts)?);
    let shell = Shell::new(store.clone(), queues.clone(), &settings, cli.export_dir.clone());

    match cli.command {
        Commands::Run { no_crawl } => run(store, queues, &settings, &shell, no_crawl).await,
        Commands::Train { path } => train(store, queues, &settings, &shell, path).await,
        Commands::Classify { file } => once(&shell, Command::Classify(file)),
        Commands::Query { terms } => once(&shell, Command::Query(terms)),
        Commands::Test => once(&shell, Command::Test),
        Commands::Export { kind } => {
            export(&store, kind, &cli.export_dir)?;
            Ok(())
        }
    }
}

fn once(shell: &Shell, command: Command) -> Result<()> {
    let mut stdout = std::io::stdout();
    shell.dispatch(command, &mut stdout)?;
    Ok(())
}

async fn run(store: Store, queues: Arc<JobQueues>, settings: &Settings, shell: &Shell, no_crawl: bool) -> Result<()> {
    let fetcher = HttpFetcher::new(&settings.user_agent, Duration::from_secs(settings.timeout_secs))?;
    let mut pipeline = Pipeline::start(store, queues, settings, Arc::new(fetcher));
    pipeline.catch_up()?;
    if !no_crawl {
        pipeline.crawl_every(Duration::from_secs(settings.crawl_interval_secs));
    }
    info!(concurrency = settings.concurrency, "indexer: pipeline running, type `help` for commands");
    let result = shell.run().await;
    pipeline.shutdown().await?;
    result
}

/// Trains, then vectorizes in-process until the training queue drains.
async fn train(store: Store, queues: Arc<JobQueues>, settings: &Settings, shell: &Shell, path: PathBuf) -> Result<()> {
    let mut events = queues.subscribe();
    once(shell, Command::Train(path))?;

    let (shutdown, rx) = watch::channel(false);
    let vectorizer = Arc::new(Vectorizer::new(store.clone(), settings.idf_variant()));
    let pool = WorkerPool::spawn(
        queues.get(QueueName::Training),
        vectorizer,
        settings.concurrency,
        Duration::from_millis(settings.poll_interval_ms),
        rx,
    );
    while let Some(event) = events.recv().await {
        if event == QueueEvent::Drained(QueueName::Training) {
            break;
        }
    }
    events.unsubscribe();
    let _ = shutdown.send(true);
    pool.join().await;
    store.flush().await?;
    info!(documents = store.documents.count(), "indexer: training complete");
    Ok(())
}
