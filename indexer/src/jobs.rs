//! Job payloads passed between pipeline stages. Only identifiers travel;
//! every stage reloads what it needs from the store.

use lemmadex_core::model::{ArticleId, DocumentId};
use lemmadex_core::queue::NewJob;
use lemmadex_core::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRef {
    pub article_id: ArticleId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LemmaRef {
    pub term: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorizeJob {
    pub document_id: DocumentId,
    pub generation: u64,
}

pub fn article_jobs(ids: &[ArticleId]) -> Result<Vec<NewJob>> {
    ids.iter().map(|&article_id| NewJob::new(article_id.to_string(), &ArticleRef { article_id })).collect()
}

pub fn lemma_jobs(terms: Vec<String>) -> Result<Vec<NewJob>> {
    terms.into_iter().map(|term| NewJob::new(term.clone(), &LemmaRef { term })).collect()
}
