//! Nearest-neighbour classification against the trained corpus.

use lemmadex_core::model::DocumentId;
use lemmadex_core::tfidf::{cosine_similarity, CorpusModel, IdfVariant};
use lemmadex_core::tokenizer::stem_text;
use lemmadex_core::{Result, Store};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub category: String,
    pub document_id: DocumentId,
    pub document: String,
    pub similarity: f64,
}

#[derive(Clone)]
pub struct Classifier {
    store: Store,
    variant: IdfVariant,
}

impl Classifier {
    pub fn new(store: Store, variant: IdfVariant) -> Self { Self { store, variant } }

    /// Category of the most similar stored document, `None` without a
    /// trained corpus. Ties go to the first document in store order.
    pub fn classify(&self, text: &str) -> Result<Option<Classification>> {
        if self.store.documents.count() == 0 {
            return Ok(None);
        }
        let features = self.store.stems.names()?;
        let mut model = CorpusModel::new(self.variant);
        for doc in self.store.documents.iter() {
            model.add_document(&doc?.stems);
        }
        let position = model.add_document(stem_text(text));
        let query = model.vector(position, &features);

        let mut best: Option<Classification> = None;
        for doc in self.store.documents.iter() {
            let doc = doc?;
            if doc.tfidf_vector.is_empty() {
                continue;
            }
            let similarity = cosine_similarity(&query, &doc.tfidf_vector);
            if best.as_ref().map_or(true, |b| similarity > b.similarity) {
                best = Some(Classification { category: doc.category, document_id: doc.id, document: doc.name, similarity });
            }
        }
        if let Some(b) = &best {
            debug!(category = %b.category, document = %b.document, similarity = b.similarity, "classified text");
        }
        Ok(best)
    }
}
