//! Lemma lookup over the inverted index, and the latency benchmark.

use lemmadex_core::model::ArticleId;
use lemmadex_core::{Error, Result, Store};
use regex::RegexBuilder;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

/// Queries run by the `test` command.
pub const BENCHMARK_QUERIES: &[&[&str]] = &[
    &["read"],
    &["mood"],
    &["beard"],
    &["mobile"],
    &["television"],
    &["watch", "me"],
    &["eat", "something"],
    &["black", "lives", "matter"],
    &["earth", "wind", "fire"],
    &["president"],
    &["climate", "change"],
    &["election", "result"],
];

#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub article_id: ArticleId,
    pub url: String,
    pub header: String,
    pub appearances: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LemmaMatch {
    pub term: String,
    pub total_appearances: u64,
    /// Non-increasing weight.
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Benchmark {
    pub queries: usize,
    pub mean: Duration,
    pub total: Duration,
}

#[derive(Clone)]
pub struct QueryService {
    store: Store,
}

impl QueryService {
    pub fn new(store: Store) -> Self { Self { store } }

    /// Lemmas whose term contains any of `terms`, case-insensitively.
    pub fn search<S: AsRef<str>>(&self, terms: &[S]) -> Result<Vec<LemmaMatch>> {
        let alternatives: Vec<String> =
            terms.iter().map(|t| t.as_ref().trim()).filter(|t| !t.is_empty()).map(regex::escape).collect();
        if alternatives.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = RegexBuilder::new(&alternatives.join("|")).case_insensitive(true).build().map_err(Error::from)?;

        let mut matches = Vec::new();
        for lemma in self.store.lemmas.iter() {
            let lemma = lemma?;
            if !pattern.is_match(&lemma.term) {
                continue;
            }
            let mut hits = Vec::with_capacity(lemma.postings.len());
            for (article_id, posting) in lemma.ranked() {
                let (url, header) = match self.store.articles.find(article_id)? {
                    Some(a) => (a.url, a.header),
                    None => (String::new(), String::new()),
                };
                hits.push(Hit { article_id, url, header, appearances: posting.appearances, weight: posting.weight });
            }
            matches.push(LemmaMatch { term: lemma.term, total_appearances: lemma.total_appearances, hits });
        }
        Ok(matches)
    }

    /// Runs every benchmark query once, timing each with a monotonic clock.
    pub fn benchmark(&self) -> Result<Benchmark> {
        let mut total = Duration::ZERO;
        for query in BENCHMARK_QUERIES {
            let start = Instant::now();
            let found = self.search(*query)?;
            let took = start.elapsed();
            info!(query = %query.join(" "), lemmas = found.len(), took_us = took.as_micros() as u64, "benchmark query");
            total += took;
        }
        let queries = BENCHMARK_QUERIES.len();
        Ok(Benchmark { queries, mean: total / queries as u32, total })
    }
}
