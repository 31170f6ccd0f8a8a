pub mod acquire;
pub mod error;
pub mod fetch;
pub mod robots;
pub mod source;

pub use acquire::{Acquired, Acquisition, ArticleJob};
pub use error::AcquireError;
pub use fetch::{Fetcher, HttpFetcher};
pub use source::Source;
