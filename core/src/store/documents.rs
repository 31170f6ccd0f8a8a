use super::{encode, get, id_key, update, values, Change};
use crate::error::Result;
use crate::model::{Document, DocumentId, NewDocument, Stem};
use sled::{Db, Tree};

#[derive(Clone)]
pub struct DocumentRepository {
    db: Db,
    documents: Tree,
}

impl DocumentRepository {
    pub(crate) fn open(db: &Db) -> Result<Self> {
        Ok(Self { db: db.clone(), documents: db.open_tree("documents")? })
    }

    pub fn create(&self, new: NewDocument) -> Result<Document> {
        let id = self.db.generate_id()?;
        let doc = Document { id, name: new.name, category: new.category, text: new.text, stems: new.stems, tfidf_vector: Vec::new() };
        self.documents.insert(id_key(id), encode(&doc)?)?;
        Ok(doc)
    }

    pub fn find(&self, id: DocumentId) -> Result<Option<Document>> {
        get(&self.documents, &id_key(id))
    }

    /// Writes the vector only if the stored one is still empty.
    pub fn set_vector(&self, id: DocumentId, vector: &[f64]) -> Result<bool> {
        update(&self.documents, &id_key(id), |doc: Option<Document>| {
            Ok(match doc {
                Some(mut d) if d.tfidf_vector.is_empty() => {
                    d.tfidf_vector = vector.to_vec();
                    Change::Put(d, true)
                }
                _ => Change::Keep(false),
            })
        })
    }

    pub fn ids(&self) -> Result<Vec<DocumentId>> {
        let mut ids = Vec::with_capacity(self.documents.len());
        for key in self.documents.iter().keys() {
            let key = key?;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&key);
            ids.push(u64::from_be_bytes(buf));
        }
        Ok(ids)
    }

    pub fn count(&self) -> usize { self.documents.len() }

    /// Streaming cursor in id (insertion) order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Document>> { values(&self.documents) }

    pub fn delete_all(&self) -> Result<usize> {
        let removed = self.documents.len();
        self.documents.clear()?;
        Ok(removed)
    }
}

/// The stem feature space, keyed by position.
#[derive(Clone)]
pub struct StemRepository {
    stems: Tree,
}

impl StemRepository {
    pub(crate) fn open(db: &Db) -> Result<Self> {
        Ok(Self { stems: db.open_tree("stems")? })
    }

    pub fn replace_all(&self, names: &[String]) -> Result<()> {
        self.stems.clear()?;
        let mut batch = sled::Batch::default();
        for (pos, name) in names.iter().enumerate() {
            batch.insert(&id_key(pos as u64)[..], encode(&Stem { name: name.clone() })?);
        }
        self.stems.apply_batch(batch)?;
        Ok(())
    }

    /// Feature space names in their fixed order.
    pub fn names(&self) -> Result<Vec<String>> {
        self.iter().map(|s| s.map(|s| s.name)).collect()
    }

    pub fn count(&self) -> usize { self.stems.len() }

    pub fn iter(&self) -> impl Iterator<Item = Result<Stem>> { values(&self.stems) }

    pub fn delete_all(&self) -> Result<usize> {
        let removed = self.stems.len();
        self.stems.clear()?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::NewDocument;
    use crate::store::Store;

    #[test]
    fn vector_is_written_once() {
        let store = Store::temporary().unwrap();
        let doc = store
            .documents
            .create(NewDocument { name: "a.txt".into(), category: "sport".into(), text: "goal".into(), stems: vec!["goal".into()] })
            .unwrap();
        assert!(store.documents.set_vector(doc.id, &[1.0, 0.0]).unwrap());
        assert!(!store.documents.set_vector(doc.id, &[9.0, 9.0]).unwrap());
        assert_eq!(store.documents.find(doc.id).unwrap().unwrap().tfidf_vector, vec![1.0, 0.0]);
        assert_eq!(store.documents.ids().unwrap(), vec![doc.id]);
    }

    #[test]
    fn stems_keep_their_order() {
        let store = Store::temporary().unwrap();
        let names: Vec<String> = ["zeta", "alpha", "mid"].iter().map(|s| s.to_string()).collect();
        store.stems.replace_all(&names).unwrap();
        assert_eq!(store.stems.names().unwrap(), names);
        store.stems.replace_all(&names[..1]).unwrap();
        assert_eq!(store.stems.count(), 1);
    }
}
