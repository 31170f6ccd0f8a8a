use crate::error::Result;
use crate::nlp::TagClasses;
use crate::tfidf::IdfVariant;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;

fn strings(items: &[&str]) -> Vec<String> { items.iter().map(|s| s.to_string()).collect() }

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerSettings {
    /// Function-word tags dropped before lemmatization.
    pub closed_class: Vec<String>,
    pub verbs: Vec<String>,
    /// Adjectives and adverbs. Any other open-class tag is a noun.
    pub adjectives: Vec<String>,
}

impl Default for TaggerSettings {
    fn default() -> Self {
        Self {
            closed_class: strings(&["CD", "CC", "DT", "EX", "IN", "LS", "MD", "PDT", "POS", "PRP", "PRP$", "RP", "TO", "UH", "WDT", "WP", "WP$", "WRB"]),
            verbs: strings(&["VB", "VBD", "VBG", "VBN", "VBP", "VBZ"]),
            adjectives: strings(&["JJ", "JJR", "JJS", "RB", "RBR", "RBS"]),
        }
    }
}

impl TaggerSettings {
    pub fn classes(&self) -> TagClasses {
        TagClasses::new(self.closed_class.clone(), self.verbs.clone(), self.adjectives.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tagger: TaggerSettings,
    /// Upper bound on the stem feature space.
    pub max_sample_space: usize,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub max_attempts: u32,
    /// Acquisition stops enqueuing once this many articles are stored.
    pub article_goal: usize,
    /// Workers per queue.
    pub concurrency: usize,
    pub smoothed_idf: bool,
    pub crawl_interval_secs: u64,
    pub poll_interval_ms: u64,
    pub sources: Vec<String>,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tagger: TaggerSettings::default(),
            max_sample_space: 8000,
            delay_min_ms: 500,
            delay_max_ms: 1000,
            max_attempts: 3,
            article_goal: 1000,
            concurrency: 4,
            smoothed_idf: false,
            crawl_interval_secs: 3600,
            poll_interval_ms: 250,
            sources: strings(&["bbc", "cbs"]),
            user_agent: "lemmadex-bot/0.1 (+https://example.com/bot)".to_string(),
            timeout_secs: 12,
        }
    }
}

impl Settings {
    /// Defaults, overlaid with a JSON file when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)?;
                Ok(serde_json::from_str(&raw)?)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn delay_range(&self) -> RangeInclusive<u64> {
        self.delay_min_ms.min(self.delay_max_ms)..=self.delay_min_ms.max(self.delay_max_ms)
    }

    pub fn idf_variant(&self) -> IdfVariant { IdfVariant::from_smoothed(self.smoothed_idf) }
}
