use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ArticleId = u64;
pub type DocumentId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosTag {
    pub token: String,
    pub tag: String,
    pub lemma: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub url: String,
    pub header: String,
    pub body: String,
    pub pos_tags: Vec<PosTag>,
    /// Set by the tagging stage, even when no open-class token survived.
    pub tagged: bool,
    /// Set once the lemma stage has posted every lemma of this article.
    pub indexed: bool,
}

impl Article {
    pub fn is_tagged(&self) -> bool { self.tagged }

    /// Lemma sequence in token order, tokens without a lemma are skipped.
    pub fn lemmas(&self) -> impl Iterator<Item = &str> {
        self.pos_tags.iter().filter_map(|t| t.lemma.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub url: String,
    pub header: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub appearances: u32,
    pub weight: f64, // tf-idf, 0 until the weighting stage ran
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lemma {
    pub term: String,
    /// Reconciled by the weighting stage only; stale in between.
    pub total_appearances: u64,
    pub postings: BTreeMap<ArticleId, Posting>,
}

impl Lemma {
    pub fn appearance_sum(&self) -> u64 {
        self.postings.values().map(|p| p.appearances as u64).sum()
    }

    /// Postings ordered by descending weight, ties by article id.
    pub fn ranked(&self) -> Vec<(ArticleId, Posting)> {
        let mut ranked: Vec<(ArticleId, Posting)> = self.postings.iter().map(|(id, p)| (*id, *p)).collect();
        ranked.sort_by(|a, b| b.1.weight.total_cmp(&a.1.weight).then_with(|| a.0.cmp(&b.0)));
        ranked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingOutcome {
    Created,
    Added,
    AlreadyIndexed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stem {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub category: String,
    pub text: String,
    pub stems: Vec<String>,
    /// Positionally aligned with the stem feature space; empty until vectorized.
    pub tfidf_vector: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub category: String,
    pub text: String,
    pub stems: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingMeta {
    pub generation: u64,
    pub documents: usize,
    pub stems: usize,
    pub trained_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranked_orders_by_weight_then_id() {
        let mut postings = BTreeMap::new();
        postings.insert(3, Posting { appearances: 1, weight: 0.5 });
        postings.insert(1, Posting { appearances: 2, weight: 0.9 });
        postings.insert(2, Posting { appearances: 4, weight: 0.5 });
        let lemma = Lemma { term: "run".into(), total_appearances: 0, postings };
        let ids: Vec<ArticleId> = lemma.ranked().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(lemma.appearance_sum(), 7);
    }
}
