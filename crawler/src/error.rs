use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("no node matched `{selector}` on {url}")]
    MissingNode { url: String, selector: &'static str },
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} not fetched: {reason}")]
    Rejected { url: String, reason: String },
    #[error(transparent)]
    Store(#[from] lemmadex_core::Error),
}

impl AcquireError {
    /// The page was fetched but did not have the expected shape.
    pub fn is_integrity(&self) -> bool { matches!(self, AcquireError::MissingNode { .. }) }
}
