//! Classifier training: labelled corpus -> documents, stem feature space and
//! vectorization jobs.

use crate::jobs::VectorizeJob;
use anyhow::{bail, Context, Result};
use lemmadex_core::model::{NewDocument, TrainingMeta};
use lemmadex_core::queue::{NewJob, Queue};
use lemmadex_core::tokenizer::{is_numeric, stem_text};
use lemmadex_core::Store;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub generation: u64,
    pub categories: usize,
    pub documents: usize,
    pub skipped: usize,
    pub stems: usize,
}

/// The `n` most frequent stems, ties broken by name.
pub fn top_stems(freq: HashMap<String, u64>, n: usize) -> Vec<String> {
    let mut ranked: Vec<(String, u64)> = freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked.into_iter().map(|(stem, _)| stem).collect()
}

fn entries(dir: &Path, dirs: bool) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() == dirs && (dirs || entry.file_type().is_file()) {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

pub struct Trainer {
    store: Store,
    max_sample_space: usize,
}

impl Trainer {
    pub fn new(store: Store, max_sample_space: usize) -> Self { Self { store, max_sample_space } }

    /// Rebuilds the training corpus from `root/<category>/<file>` and enqueues
    /// one vectorization job per stored document on `queue`. The previous
    /// corpus is kept when no readable document is found.
    pub fn train(&self, root: &Path, queue: &Queue) -> Result<TrainingReport> {
        let mut corpus = Vec::new();
        let mut skipped = 0;
        for category_dir in entries(root, true).with_context(|| format!("reading training root {}", root.display()))? {
            let category = file_name(&category_dir);
            for path in entries(&category_dir, false)? {
                let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
                match String::from_utf8(bytes) {
                    Ok(text) => corpus.push((category.clone(), file_name(&path), text)),
                    Err(_) => {
                        warn!(path = %path.display(), "skipping non UTF-8 document");
                        skipped += 1;
                    }
                }
            }
        }
        if corpus.is_empty() {
            bail!("no readable training documents under {} ({skipped} skipped)", root.display());
        }
        let categories = corpus.iter().map(|(c, _, _)| c.as_str()).collect::<BTreeSet<_>>().len();

        self.store.documents.delete_all()?;
        self.store.stems.delete_all()?;
        let generation = self.store.bump_generation()?;
        info!(generation, categories, documents = corpus.len(), skipped, "training started");

        let mut freq: HashMap<String, u64> = HashMap::new();
        let mut jobs = Vec::with_capacity(corpus.len());
        for (category, name, text) in corpus {
            let stems = stem_text(&text);
            for stem in stems.iter().filter(|s| !is_numeric(s)) {
                *freq.entry(stem.clone()).or_insert(0) += 1;
            }
            let doc = self.store.documents.create(NewDocument { name, category, text, stems })?;
            jobs.push(NewJob::new(doc.id.to_string(), &VectorizeJob { document_id: doc.id, generation })?);
        }

        let features = top_stems(freq, self.max_sample_space);
        self.store.stems.replace_all(&features)?;

        let documents = jobs.len();
        let trained_at = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        self.store.save_training_meta(&TrainingMeta { generation, documents, stems: features.len(), trained_at })?;
        queue.add_bulk(jobs)?;

        info!(generation, documents, skipped, stems = features.len(), "training corpus stored, vectorization enqueued");
        Ok(TrainingReport { generation, categories, documents, skipped, stems: features.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_stems_breaks_ties_by_name() {
        let freq = HashMap::from([("vote".to_string(), 3), ("goal".to_string(), 5), ("ball".to_string(), 3), ("rain".to_string(), 1)]);
        assert_eq!(top_stems(freq, 3), vec!["goal", "ball", "vote"]);
    }
}
