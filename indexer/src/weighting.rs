//! Weighting stage: TF-IDF per posting plus reconciliation of the lemma total.

use crate::jobs::LemmaRef;
use async_trait::async_trait;
use lemmadex_core::model::{ArticleId, Lemma};
use lemmadex_core::queue::{Job, JobHandler};
use lemmadex_core::tfidf::{self, IdfVariant};
use lemmadex_core::{Result, Store};
use std::collections::HashMap;
use tracing::{debug, info};

pub struct Weighting {
    store: Store,
    variant: IdfVariant,
}

impl Weighting {
    pub fn new(store: Store, variant: IdfVariant) -> Self { Self { store, variant } }

    /// Term frequency of `term` in every tagged article containing it, and
    /// the number of tagged articles. Streams the article tree.
    fn term_frequencies(&self, term: &str) -> Result<(HashMap<ArticleId, u32>, usize)> {
        let mut tf = HashMap::new();
        let mut tagged = 0;
        for article in self.store.articles.iter() {
            let article = article?;
            if !article.is_tagged() {
                continue;
            }
            tagged += 1;
            let n = article.lemmas().filter(|l| *l == term).count() as u32;
            if n > 0 {
                tf.insert(article.id, n);
            }
        }
        Ok((tf, tagged))
    }

    /// Recomputes every posting weight of `term` and its appearance total.
    pub fn weigh(&self, term: &str) -> Result<Option<Lemma>> {
        if self.store.lemmas.find(term)?.is_none() {
            info!(term, "lemma not found, nothing to weigh");
            return Ok(None);
        }
        let (tf, num_docs) = self.term_frequencies(term)?;
        let df = tf.len();
        let weights: HashMap<ArticleId, f64> =
            tf.into_iter().map(|(id, n)| (id, tfidf::tfidf(n, num_docs, df, self.variant))).collect();
        let lemma = self.store.lemmas.reconcile(term, &weights)?;
        if let Some(l) = &lemma {
            debug!(term, postings = l.postings.len(), total = l.total_appearances, "weighted lemma");
        }
        Ok(lemma)
    }
}

#[async_trait]
impl JobHandler for Weighting {
    async fn handle(&self, job: &Job) -> anyhow::Result<()> {
        let LemmaRef { term } = job.payload()?;
        self.weigh(&term)?;
        Ok(())
    }
}
