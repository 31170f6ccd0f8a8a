//! Lemma stage: posts each tagged article into the lemma inverted index.

use crate::jobs::ArticleRef;
use async_trait::async_trait;
use lemmadex_core::model::{ArticleId, PostingOutcome};
use lemmadex_core::queue::{Job, JobHandler};
use lemmadex_core::{Result, Store};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexReport {
    pub created: usize,
    pub added: usize,
    pub already_indexed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed(IndexReport),
    Untagged,
    Missing,
}

/// Unique lemmas in first-seen order with their occurrence counts.
pub fn lemma_counts<'a>(lemmas: impl Iterator<Item = &'a str>) -> Vec<(&'a str, u32)> {
    let mut order = Vec::new();
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for lemma in lemmas {
        let n = counts.entry(lemma).or_insert(0);
        if *n == 0 {
            order.push(lemma);
        }
        *n += 1;
    }
    order.into_iter().map(|l| (l, counts[l])).collect()
}

pub struct LemmaIndexer {
    store: Store,
}

impl LemmaIndexer {
    pub fn new(store: Store) -> Self { Self { store } }

    pub fn index_article(&self, id: ArticleId) -> Result<IndexOutcome> {
        let Some(article) = self.store.articles.find(id)? else {
            info!(article_id = id, "article not found, nothing to index");
            return Ok(IndexOutcome::Missing);
        };
        if !article.is_tagged() {
            info!(article_id = id, "article not tagged yet");
            return Ok(IndexOutcome::Untagged);
        }

        let mut report = IndexReport::default();
        for (term, count) in lemma_counts(article.lemmas()) {
            match self.store.lemmas.add_posting(term, id, count)? {
                PostingOutcome::Created => report.created += 1,
                PostingOutcome::Added => report.added += 1,
                PostingOutcome::AlreadyIndexed => {
                    debug!(article_id = id, term, "posting already present");
                    report.already_indexed += 1;
                }
            }
        }
        self.store.articles.mark_indexed(id)?;
        debug!(article_id = id, created = report.created, added = report.added, "indexed article");
        Ok(IndexOutcome::Indexed(report))
    }
}

#[async_trait]
impl JobHandler for LemmaIndexer {
    async fn handle(&self, job: &Job) -> anyhow::Result<()> {
        let ArticleRef { article_id } = job.payload()?;
        self.index_article(article_id)?;
        Ok(())
    }
}
