//! Tagging stage: article body -> part-of-speech tags with lemmas.

use crate::jobs::ArticleRef;
use async_trait::async_trait;
use lemmadex_core::model::{ArticleId, PosTag};
use lemmadex_core::nlp::{Lemmatizer, LexiconTagger, PosTagger, RuleLemmatizer, TagClasses};
use lemmadex_core::queue::{Job, JobHandler};
use lemmadex_core::tokenizer::words;
use lemmadex_core::{Result, Store};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    Tagged(usize),
    AlreadyTagged,
    Missing,
}

pub struct Tagging {
    store: Store,
    tagger: Arc<dyn PosTagger>,
    lemmatizer: Arc<dyn Lemmatizer>,
    classes: TagClasses,
}

impl Tagging {
    pub fn new(store: Store, tagger: Arc<dyn PosTagger>, lemmatizer: Arc<dyn Lemmatizer>, classes: TagClasses) -> Self {
        Self { store, tagger, lemmatizer, classes }
    }

    /// Lexicon tagger and rule lemmatizer.
    pub fn with_defaults(store: Store, classes: TagClasses) -> Self {
        Self::new(store, Arc::new(LexiconTagger), Arc::new(RuleLemmatizer), classes)
    }

    /// Open-class tokens of `text` with their tags and lemmas, in text order.
    pub fn annotate(&self, text: &str) -> Vec<PosTag> {
        let tokens = words(text);
        self.tagger
            .tag(&tokens)
            .into_iter()
            .filter(|w| !self.classes.is_closed(&w.tag))
            .map(|w| {
                let lemma = self.lemmatizer.lemmatize(&w.token, self.classes.class_of(&w.tag));
                PosTag { token: w.token, tag: w.tag, lemma: Some(lemma) }
            })
            .collect()
    }

    pub fn tag_article(&self, id: ArticleId) -> Result<TagOutcome> {
        let Some(article) = self.store.articles.find(id)? else {
            info!(article_id = id, "article not found, nothing to tag");
            return Ok(TagOutcome::Missing);
        };
        if article.is_tagged() {
            info!(article_id = id, "article already tagged");
            return Ok(TagOutcome::AlreadyTagged);
        }
        let tags = self.annotate(&article.body);
        if !self.store.articles.set_tags(id, &tags)? {
            info!(article_id = id, "article tagged concurrently");
            return Ok(TagOutcome::AlreadyTagged);
        }
        debug!(article_id = id, tags = tags.len(), "tagged article");
        Ok(TagOutcome::Tagged(tags.len()))
    }
}

#[async_trait]
impl JobHandler for Tagging {
    async fn handle(&self, job: &Job) -> anyhow::Result<()> {
        let ArticleRef { article_id } = job.payload()?;
        self.tag_article(article_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemmadex_core::model::NewArticle;
    use lemmadex_core::Settings;

    fn tagging(store: &Store) -> Tagging {
        Tagging::with_defaults(store.clone(), Settings::default().tagger.classes())
    }

    #[test]
    fn closed_class_tokens_are_dropped() {
        let store = Store::temporary().unwrap();
        let tags = tagging(&store).annotate("The children were running to the 3 cities");
        let lemmas: Vec<&str> = tags.iter().filter_map(|t| t.lemma.as_deref()).collect();
        assert_eq!(lemmas, vec!["child", "be", "run", "city"]);
        assert!(tags.iter().all(|t| t.tag != "DT" && t.tag != "CD" && t.tag != "TO"));
    }

    #[test]
    fn tags_once() {
        let store = Store::temporary().unwrap();
        let article = store
            .articles
            .create(NewArticle { url: "https://www.bbc.com/news/a-1".into(), header: "h".into(), body: "Markets rallied strongly".into() })
            .unwrap()
            .unwrap();
        let stage = tagging(&store);
        assert_eq!(stage.tag_article(article.id).unwrap(), TagOutcome::Tagged(3));
        assert_eq!(stage.tag_article(article.id).unwrap(), TagOutcome::AlreadyTagged);
        assert_eq!(stage.tag_article(9999).unwrap(), TagOutcome::Missing);
    }

    #[test]
    fn function_words_only_is_tagged_once() {
        let store = Store::temporary().unwrap();
        let article = store
            .articles
            .create(NewArticle { url: "https://www.bbc.com/news/a-2".into(), header: "h".into(), body: "The and of it".into() })
            .unwrap()
            .unwrap();
        let stage = tagging(&store);
        assert_eq!(stage.tag_article(article.id).unwrap(), TagOutcome::Tagged(0));
        assert_eq!(stage.tag_article(article.id).unwrap(), TagOutcome::AlreadyTagged);
        assert!(store.articles.untagged_ids().unwrap().is_empty());
    }
}
