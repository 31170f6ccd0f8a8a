pub mod config;
pub mod error;
pub mod model;
pub mod nlp;
pub mod queue;
pub mod store;
pub mod tfidf;
pub mod tokenizer;

pub use config::Settings;
pub use error::{Error, Result};
pub use model::*;
pub use queue::{Job, JobHandler, JobQueues, NewJob, QueueEvent, QueueName, WorkerPool};
pub use store::Store;
