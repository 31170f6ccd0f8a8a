pub mod classify;
pub mod export;
pub mod jobs;
pub mod orchestrator;
pub mod postings;
pub mod query;
pub mod shell;
pub mod tagging;
pub mod training;
pub mod vectorize;
pub mod weighting;

pub use classify::{Classification, Classifier};
pub use orchestrator::Pipeline;
pub use query::QueryService;
pub use training::Trainer;
