//! Vectorization worker: TF-IDF vectors for the training documents.

use crate::jobs::VectorizeJob;
use async_trait::async_trait;
use lemmadex_core::model::DocumentId;
use lemmadex_core::queue::{Job, JobHandler};
use lemmadex_core::tfidf::{CorpusModel, IdfVariant};
use lemmadex_core::{Result, Store};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Read-only view of one training generation.
pub struct CorpusSnapshot {
    pub generation: u64,
    pub model: CorpusModel,
    pub positions: HashMap<DocumentId, usize>,
    pub features: Vec<String>,
}

impl CorpusSnapshot {
    pub fn load(store: &Store, variant: IdfVariant) -> Result<Self> {
        let generation = store.generation()?;
        let mut model = CorpusModel::new(variant);
        let mut positions = HashMap::new();
        for doc in store.documents.iter() {
            let doc = doc?;
            let pos = model.add_document(&doc.stems);
            positions.insert(doc.id, pos);
        }
        Ok(Self { generation, model, positions, features: store.stems.names()? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorOutcome {
    Vectorized,
    AlreadyVectorized,
    Missing,
    Stale,
}

pub struct Vectorizer {
    store: Store,
    variant: IdfVariant,
    snapshot: RwLock<Option<Arc<CorpusSnapshot>>>,
}

impl Vectorizer {
    pub fn new(store: Store, variant: IdfVariant) -> Self {
        Self { store, variant, snapshot: RwLock::new(None) }
    }

    fn snapshot(&self, generation: u64) -> Result<Arc<CorpusSnapshot>> {
        if let Some(s) = self.snapshot.read().as_ref().filter(|s| s.generation == generation) {
            return Ok(s.clone());
        }
        let fresh = Arc::new(CorpusSnapshot::load(&self.store, self.variant)?);
        info!(generation = fresh.generation, documents = fresh.model.len(), features = fresh.features.len(), "loaded corpus model");
        *self.snapshot.write() = Some(fresh.clone());
        Ok(fresh)
    }

    pub fn vectorize(&self, job: VectorizeJob) -> Result<VectorOutcome> {
        if job.generation != self.store.generation()? {
            info!(document_id = job.document_id, generation = job.generation, "job from a previous training run");
            return Ok(VectorOutcome::Stale);
        }
        let Some(doc) = self.store.documents.find(job.document_id)? else {
            info!(document_id = job.document_id, "document not found");
            return Ok(VectorOutcome::Missing);
        };
        if !doc.tfidf_vector.is_empty() {
            info!(document_id = doc.id, "document already vectorized");
            return Ok(VectorOutcome::AlreadyVectorized);
        }
        let snapshot = self.snapshot(job.generation)?;
        let Some(&pos) = snapshot.positions.get(&doc.id) else {
            return Ok(VectorOutcome::Missing);
        };
        let vector = snapshot.model.vector(pos, &snapshot.features);
        if !self.store.documents.set_vector(doc.id, &vector)? {
            return Ok(VectorOutcome::AlreadyVectorized);
        }
        debug!(document_id = doc.id, dims = vector.len(), "vectorized document");
        Ok(VectorOutcome::Vectorized)
    }
}

#[async_trait]
impl JobHandler for Vectorizer {
    async fn handle(&self, job: &Job) -> anyhow::Result<()> {
        self.vectorize(job.payload()?)?;
        Ok(())
    }
}
