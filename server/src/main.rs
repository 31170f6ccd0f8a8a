use anyhow::{Context, Result};
use clap::Parser;
use lemmadex_core::{Settings, Store};
use server::{build_app, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "server")]
#[command(about = "HTTP API over the lemma index and the classifier")]
struct Args {
    /// sled database directory; the server holds it exclusively
    #[arg(long, env = "LEMMADEX_DB", default_value = "./data/lemmadex.sled")]
    db: PathBuf,
    /// Optional JSON settings file
    #[arg(long, env = "LEMMADEX_CONFIG")]
    config: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Token required in X-ADMIN-TOKEN for admin routes
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,
    /// Comma-separated CORS origins, any origin when unset
    #[arg(long, env = "CORS_ALLOW_ORIGIN")]
    cors_allow_origin: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();
    let args = Args::parse();

    let settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    let store = Store::open(&args.db).with_context(|| format!("opening store at {}", args.db.display()))?;
    let state = AppState::new(store.clone(), &settings, args.admin_token)?;
    let app = build_app(state, args.cors_allow_origin.as_deref());

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    store.flush().await?;
    Ok(())
}
