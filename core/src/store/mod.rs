//! sled-backed entity store.
//!
//! One tree per entity, values bincode-encoded. Conditional writes go through
//! [`update`], a compare-and-swap loop, so concurrent workers never lose each
//! other's writes to the same record.

mod articles;
mod documents;
mod lemmas;

pub use articles::ArticleRepository;
pub use documents::{DocumentRepository, StemRepository};
pub use lemmas::LemmaRepository;

use crate::error::{Error, Result};
use crate::model::TrainingMeta;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};
use std::path::Path;

const GENERATION_KEY: &[u8] = b"generation";
const TRAINING_KEY: &[u8] = b"training";

#[derive(Clone)]
pub struct Store {
    db: Db,
    meta: Tree,
    pub articles: ArticleRepository,
    pub lemmas: LemmaRepository,
    pub stems: StemRepository,
    pub documents: DocumentRepository,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::with_db(db)
    }

    /// Store backed by a temporary directory removed on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db)
    }

    fn with_db(db: Db) -> Result<Self> {
        Ok(Self {
            meta: db.open_tree("meta")?,
            articles: ArticleRepository::open(&db)?,
            lemmas: LemmaRepository::open(&db)?,
            stems: StemRepository::open(&db)?,
            documents: DocumentRepository::open(&db)?,
            db,
        })
    }

    pub fn db(&self) -> &Db { &self.db }

    pub fn generation(&self) -> Result<u64> {
        Ok(get::<u64>(&self.meta, GENERATION_KEY)?.unwrap_or(0))
    }

    /// Advances the corpus generation and returns the new value.
    pub fn bump_generation(&self) -> Result<u64> {
        update(&self.meta, GENERATION_KEY, |current: Option<u64>| {
            let next = current.unwrap_or(0) + 1;
            Ok(Change::Put(next, next))
        })
    }

    pub fn training_meta(&self) -> Result<Option<TrainingMeta>> {
        get(&self.meta, TRAINING_KEY)
    }

    pub fn save_training_meta(&self, meta: &TrainingMeta) -> Result<()> {
        self.meta.insert(TRAINING_KEY, encode(meta)?)?;
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

pub(crate) fn id_key(id: u64) -> [u8; 8] { id.to_be_bytes() }

pub(crate) fn get<T: DeserializeOwned>(tree: &Tree, key: &[u8]) -> Result<Option<T>> {
    match tree.get(key)? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

/// Streams every value of a tree, decoding lazily.
pub(crate) fn values<T: DeserializeOwned>(tree: &Tree) -> impl Iterator<Item = Result<T>> {
    tree.iter().values().map(|v| v.map_err(Error::from).and_then(|bytes| decode(&bytes)))
}

pub(crate) enum Change<T, R> {
    Keep(R),
    Put(T, R),
}

/// Read-modify-write of a single record, retried until the compare-and-swap
/// lands. `f` may run more than once and must not have side effects.
pub(crate) fn update<T, R, F>(tree: &Tree, key: &[u8], mut f: F) -> Result<R>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(Option<T>) -> Result<Change<T, R>>,
{
    loop {
        let current = tree.get(key)?;
        let decoded = match &current {
            Some(bytes) => Some(decode::<T>(bytes)?),
            None => None,
        };
        match f(decoded)? {
            Change::Keep(out) => return Ok(out),
            Change::Put(value, out) => {
                let bytes = encode(&value)?;
                if tree.compare_and_swap(key, current, Some(bytes))?.is_ok() {
                    return Ok(out);
                }
                tracing::trace!("compare-and-swap lost a race, retrying");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_monotonic() {
        let store = Store::temporary().unwrap();
        assert_eq!(store.generation().unwrap(), 0);
        assert_eq!(store.bump_generation().unwrap(), 1);
        assert_eq!(store.bump_generation().unwrap(), 2);
        assert_eq!(store.generation().unwrap(), 2);
    }

    #[test]
    fn training_meta_round_trips() {
        let store = Store::temporary().unwrap();
        assert!(store.training_meta().unwrap().is_none());
        let meta = TrainingMeta { generation: 3, documents: 10, stems: 42, trained_at: "2024-01-01T00:00:00Z".into() };
        store.save_training_meta(&meta).unwrap();
        let loaded = store.training_meta().unwrap().unwrap();
        assert_eq!(loaded.generation, 3);
        assert_eq!(loaded.stems, 42);
    }
}
