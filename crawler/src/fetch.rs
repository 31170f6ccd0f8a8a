use crate::error::AcquireError;
use crate::robots::Robots;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{header, Client, Url};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Body of an HTML page.
    async fn fetch(&self, url: &str) -> Result<String, AcquireError>;
}

/// reqwest client honouring robots.txt per host.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    robots: Arc<RwLock<HashMap<String, Robots>>>,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, robots: Arc::new(RwLock::new(HashMap::new())) })
    }

    async fn rules_for(&self, url: &Url) -> Robots {
        let host = match url.port() {
            Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
            None => url.host_str().unwrap_or_default().to_string(),
        };
        let cached = { self.robots.read().get(&host).cloned() };
        if let Some(rules) = cached.filter(|r| !r.is_stale()) {
            return rules;
        }
        let robots_url = format!("{}://{}/robots.txt", url.scheme(), host);
        let rules = match self.client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => Robots::parse(&resp.text().await.unwrap_or_default()),
            _ => Robots::permissive(),
        };
        debug!(host = %host, "fetched robots.txt");
        self.robots.write().insert(host, rules.clone());
        rules
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AcquireError> {
        let rejected = |reason: &str| AcquireError::Rejected { url: url.to_string(), reason: reason.to_string() };
        let parsed = Url::parse(url).map_err(|_| rejected("invalid url"))?;
        let rules = self.rules_for(&parsed).await;
        if !rules.allows(parsed.path()) {
            return Err(rejected("disallowed by robots.txt"));
        }
        if let Some(delay) = rules.crawl_delay_ms {
            sleep(Duration::from_millis(delay)).await;
        }

        let resp = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|source| AcquireError::Http { url: url.to_string(), source })?;
        if !resp.status().is_success() {
            return Err(AcquireError::Status { url: url.to_string(), status: resp.status().as_u16() });
        }
        if let Some(ct) = resp.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
            if !ct.starts_with("text/html") {
                return Err(rejected("not html"));
            }
        }
        let bytes = resp.bytes().await.map_err(|source| AcquireError::Http { url: url.to_string(), source })?;
        if bytes.len() > MAX_PAGE_BYTES {
            return Err(rejected("page too large"));
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
