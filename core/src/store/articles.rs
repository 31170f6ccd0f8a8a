use super::{encode, get, id_key, update, values, Change};
use crate::error::{Error, Result};
use crate::model::{Article, ArticleId, NewArticle, PosTag};
use sled::transaction::{TransactionError, TransactionResult};
use sled::{Db, Transactional, Tree};

#[derive(Clone)]
pub struct ArticleRepository {
    db: Db,
    articles: Tree,
    urls: Tree, // url -> article id
}

impl ArticleRepository {
    pub(crate) fn open(db: &Db) -> Result<Self> {
        Ok(Self { db: db.clone(), articles: db.open_tree("articles")?, urls: db.open_tree("article_urls")? })
    }

    pub fn exists(&self, url: &str) -> Result<bool> {
        Ok(self.urls.contains_key(url.as_bytes())?)
    }

    /// Inserts the article unless its url is already stored. Returns `None`
    /// when another writer got there first.
    pub fn create(&self, new: NewArticle) -> Result<Option<Article>> {
        let id = self.db.generate_id()?;
        let article = Article { id, url: new.url, header: new.header, body: new.body, pos_tags: Vec::new(), tagged: false, indexed: false };
        let bytes = encode(&article)?;
        let key = id_key(id);
        let url = article.url.as_bytes();

        let created: TransactionResult<bool> = (&self.urls, &self.articles).transaction(|(urls, articles)| {
            if urls.get(url)?.is_some() {
                return Ok(false);
            }
            urls.insert(url, &key[..])?;
            articles.insert(&key[..], &bytes[..])?;
            Ok(true)
        });
        match created {
            Ok(true) => Ok(Some(article)),
            Ok(false) => Ok(None),
            Err(TransactionError::Storage(e)) => Err(Error::Store(e)),
            Err(TransactionError::Abort(())) => Err(Error::Invalid("article insert aborted".into())),
        }
    }

    pub fn find(&self, id: ArticleId) -> Result<Option<Article>> {
        get(&self.articles, &id_key(id))
    }

    pub fn find_by_url(&self, url: &str) -> Result<Option<Article>> {
        match self.urls.get(url.as_bytes())? {
            Some(key) => get(&self.articles, &key),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> usize { self.articles.len() }

    /// Streaming cursor over every article.
    pub fn iter(&self) -> impl Iterator<Item = Result<Article>> { values(&self.articles) }

    pub fn ids_where<F: Fn(&Article) -> bool>(&self, filter: F) -> Result<Vec<ArticleId>> {
        let mut ids = Vec::new();
        for article in self.iter() {
            let article = article?;
            if filter(&article) { ids.push(article.id); }
        }
        Ok(ids)
    }

    pub fn untagged_ids(&self) -> Result<Vec<ArticleId>> {
        self.ids_where(|a| !a.is_tagged())
    }

    pub fn unindexed_ids(&self) -> Result<Vec<ArticleId>> {
        self.ids_where(|a| a.is_tagged() && !a.indexed)
    }

    /// Stores the tag sequence only if the article is still untagged.
    pub fn set_tags(&self, id: ArticleId, tags: &[PosTag]) -> Result<bool> {
        update(&self.articles, &id_key(id), |article: Option<Article>| {
            Ok(match article {
                Some(mut a) if !a.is_tagged() => {
                    a.pos_tags = tags.to_vec();
                    a.tagged = true;
                    Change::Put(a, true)
                }
                _ => Change::Keep(false),
            })
        })
    }

    pub fn mark_indexed(&self, id: ArticleId) -> Result<bool> {
        update(&self.articles, &id_key(id), |article: Option<Article>| {
            Ok(match article {
                Some(mut a) if !a.indexed => {
                    a.indexed = true;
                    Change::Put(a, true)
                }
                _ => Change::Keep(false),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{NewArticle, PosTag};
    use crate::store::Store;

    fn new(url: &str) -> NewArticle {
        NewArticle { url: url.into(), header: "Header".into(), body: "Body text".into() }
    }

    #[test]
    fn url_is_unique() {
        let store = Store::temporary().unwrap();
        let first = store.articles.create(new("https://example.com/a")).unwrap();
        assert!(first.is_some());
        assert!(store.articles.exists("https://example.com/a").unwrap());
        let second = store.articles.create(new("https://example.com/a")).unwrap();
        assert!(second.is_none());
        assert_eq!(store.articles.count(), 1);
    }

    #[test]
    fn tags_are_written_once() {
        let store = Store::temporary().unwrap();
        let article = store.articles.create(new("https://example.com/b")).unwrap().unwrap();
        let tags = vec![PosTag { token: "Dogs".into(), tag: "NNS".into(), lemma: Some("dog".into()) }];
        assert!(store.articles.set_tags(article.id, &tags).unwrap());
        assert!(!store.articles.set_tags(article.id, &[]).unwrap());
        let stored = store.articles.find(article.id).unwrap().unwrap();
        assert_eq!(stored.pos_tags, tags);
        assert_eq!(store.articles.unindexed_ids().unwrap(), vec![article.id]);
        assert!(store.articles.untagged_ids().unwrap().is_empty());
    }

    #[test]
    fn empty_tag_sequence_still_marks_tagged() {
        let store = Store::temporary().unwrap();
        let article = store.articles.create(new("https://example.com/c")).unwrap().unwrap();
        assert!(store.articles.set_tags(article.id, &[]).unwrap());
        let stored = store.articles.find(article.id).unwrap().unwrap();
        assert!(stored.is_tagged());
        assert!(stored.pos_tags.is_empty());
        assert!(store.articles.untagged_ids().unwrap().is_empty());
        assert!(!store.articles.set_tags(article.id, &[]).unwrap());
    }

    #[test]
    fn missing_article_is_not_tagged() {
        let store = Store::temporary().unwrap();
        assert!(!store.articles.set_tags(99, &[]).unwrap());
        assert!(!store.articles.mark_indexed(99).unwrap());
    }
}
