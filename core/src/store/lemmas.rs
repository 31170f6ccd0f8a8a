use super::{get, update, values, Change};
use crate::error::Result;
use crate::model::{ArticleId, Lemma, Posting, PostingOutcome};
use sled::{Db, Tree};
use std::collections::{BTreeMap, HashMap};

#[derive(Clone)]
pub struct LemmaRepository {
    lemmas: Tree, // term -> Lemma
}

impl LemmaRepository {
    pub(crate) fn open(db: &Db) -> Result<Self> {
        Ok(Self { lemmas: db.open_tree("lemmas")? })
    }

    /// Insert-if-absent on the `(term, article)` posting key.
    ///
    /// The aggregate `total_appearances` is left untouched; only the weighting
    /// stage writes it.
    pub fn add_posting(&self, term: &str, article_id: ArticleId, appearances: u32) -> Result<PostingOutcome> {
        let posting = Posting { appearances, weight: 0.0 };
        update(&self.lemmas, term.as_bytes(), |lemma: Option<Lemma>| {
            Ok(match lemma {
                None => {
                    let mut postings = BTreeMap::new();
                    postings.insert(article_id, posting);
                    Change::Put(Lemma { term: term.to_string(), total_appearances: 0, postings }, PostingOutcome::Created)
                }
                Some(l) if l.postings.contains_key(&article_id) => Change::Keep(PostingOutcome::AlreadyIndexed),
                Some(mut l) => {
                    l.postings.insert(article_id, posting);
                    Change::Put(l, PostingOutcome::Added)
                }
            })
        })
    }

    /// Recomputes the total from the current postings and writes the given
    /// weights into postings that already exist. Articles absent from the
    /// posting list are ignored.
    pub fn reconcile(&self, term: &str, weights: &HashMap<ArticleId, f64>) -> Result<Option<Lemma>> {
        update(&self.lemmas, term.as_bytes(), |lemma: Option<Lemma>| {
            Ok(match lemma {
                None => Change::Keep(None),
                Some(mut l) => {
                    for (id, posting) in l.postings.iter_mut() {
                        if let Some(weight) = weights.get(id) {
                            posting.weight = *weight;
                        }
                    }
                    l.total_appearances = l.appearance_sum();
                    Change::Put(l.clone(), Some(l))
                }
            })
        })
    }

    pub fn find(&self, term: &str) -> Result<Option<Lemma>> {
        get(&self.lemmas, term.as_bytes())
    }

    /// Distinct terms in key order.
    pub fn terms(&self) -> Result<Vec<String>> {
        let mut terms = Vec::with_capacity(self.lemmas.len());
        for key in self.lemmas.iter().keys() {
            terms.push(String::from_utf8_lossy(&key?).into_owned());
        }
        Ok(terms)
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Lemma>> { values(&self.lemmas) }

    /// Whether some lemma gained postings since it was last weighted.
    pub fn has_unreconciled(&self) -> Result<bool> {
        for lemma in self.iter() {
            let lemma = lemma?;
            if lemma.total_appearances != lemma.appearance_sum() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
