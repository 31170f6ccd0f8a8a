//! TF-IDF over bags of terms, and cosine similarity.
//!
//! `tf` is the raw term count in a document. `idf` is `ln(N / df)` by
//! default, so a term present in every document scores zero; the smoothed
//! variant `ln(1 + N / df)` never reaches zero.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdfVariant {
    #[default]
    Standard,
    Smoothed,
}

impl IdfVariant {
    pub fn from_smoothed(smoothed: bool) -> Self {
        if smoothed { IdfVariant::Smoothed } else { IdfVariant::Standard }
    }
}

pub fn idf(num_docs: usize, df: usize, variant: IdfVariant) -> f64 {
    if num_docs == 0 || df == 0 {
        return 0.0;
    }
    let ratio = num_docs as f64 / df as f64;
    match variant {
        IdfVariant::Standard => ratio.ln().max(0.0),
        IdfVariant::Smoothed => (1.0 + ratio).ln(),
    }
}

pub fn tfidf(tf: u32, num_docs: usize, df: usize, variant: IdfVariant) -> f64 {
    if tf == 0 {
        return 0.0;
    }
    tf as f64 * idf(num_docs, df, variant)
}

/// Cosine of the angle between two vectors; zero when either has zero norm.
/// Vectors of different length are compared over their common prefix.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let (mut dot, mut na, mut nb) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Per-document term counts plus document frequencies for a whole corpus.
/// Built once, then shared read-only.
#[derive(Debug, Clone, Default)]
pub struct CorpusModel {
    docs: Vec<HashMap<String, u32>>,
    df: HashMap<String, usize>,
    variant: IdfVariant,
}

impl CorpusModel {
    pub fn new(variant: IdfVariant) -> Self {
        Self { docs: Vec::new(), df: HashMap::new(), variant }
    }

    /// Appends a document and returns its position.
    pub fn add_document<I, S>(&mut self, terms: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for term in terms {
            *counts.entry(term.as_ref().to_string()).or_insert(0) += 1;
        }
        for term in counts.keys() {
            *self.df.entry(term.clone()).or_insert(0) += 1;
        }
        self.docs.push(counts);
        self.docs.len() - 1
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn tf(&self, term: &str, doc: usize) -> u32 {
        self.docs.get(doc).and_then(|d| d.get(term)).copied().unwrap_or(0)
    }

    pub fn df(&self, term: &str) -> usize { self.df.get(term).copied().unwrap_or(0) }

    pub fn idf(&self, term: &str) -> f64 { idf(self.docs.len(), self.df(term), self.variant) }

    pub fn tfidf(&self, term: &str, doc: usize) -> f64 {
        tfidf(self.tf(term, doc), self.docs.len(), self.df(term), self.variant)
    }

    /// TF-IDF of every feature, in feature order, for one document.
    pub fn vector(&self, doc: usize, features: &[String]) -> Vec<f64> {
        features.iter().map(|f| self.tfidf(f, doc)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_in_every_document_scores_zero() {
        let mut model = CorpusModel::new(IdfVariant::Standard);
        model.add_document(["news", "goal", "goal"]);
        model.add_document(["news", "vote"]);
        assert_eq!(model.idf("news"), 0.0);
        assert_eq!(model.tfidf("news", 0), 0.0);
        assert!(model.tfidf("goal", 0) > 0.0);
        assert_eq!(model.tfidf("goal", 1), 0.0);
        assert!((model.tfidf("goal", 0) - 2.0 * 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn smoothed_idf_stays_positive() {
        assert!(idf(2, 2, IdfVariant::Smoothed) > 0.0);
        assert_eq!(idf(0, 0, IdfVariant::Smoothed), 0.0);
    }

    #[test]
    fn cosine_bounds() {
        let v = [0.3, 1.2, 0.0, 4.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&v, &[0.0; 4]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn vector_follows_feature_order() {
        let mut model = CorpusModel::new(IdfVariant::Standard);
        model.add_document(["a", "b"]);
        model.add_document(["c"]);
        let features = vec!["c".to_string(), "a".to_string(), "zz".to_string()];
        let v = model.vector(0, &features);
        assert_eq!(v.len(), 3);
        assert_eq!(v[0], 0.0);
        assert!(v[1] > 0.0);
        assert_eq!(v[2], 0.0);
    }
}
