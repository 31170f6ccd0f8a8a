//! News sources and their extraction rules.

use crate::error::AcquireError;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

lazy_static! {
    static ref BBC_LINKS: Selector = Selector::parse("#index-page a").expect("valid selector");
    static ref BBC_HEADER: Selector = Selector::parse("h1").expect("valid selector");
    static ref BBC_BODY: Selector = Selector::parse("article p").expect("valid selector");
    static ref CBS_LINKS: Selector = Selector::parse(".item__anchor").expect("valid selector");
    static ref CBS_HEADER: Selector = Selector::parse(".content__title").expect("valid selector");
    static ref CBS_BODY: Selector = Selector::parse(".content__body p").expect("valid selector");
    static ref BBC_ARTICLE: Regex =
        Regex::new(r"^https://www\.bbc\.com/news/(?:[a-z0-9-]*-\d+|articles/[a-z0-9]+)$").expect("valid regex");
    static ref CBS_ARTICLE: Regex = Regex::new(r"^https://www\.cbsnews\.com/news/[a-z0-9-]+/?$").expect("valid regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Bbc,
    Cbs,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Bbc, Source::Cbs];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bbc" => Some(Source::Bbc),
            "cbs" => Some(Source::Cbs),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Source::Bbc => "bbc",
            Source::Cbs => "cbs",
        }
    }

    /// Front page listing the latest articles.
    pub fn listing_url(self) -> &'static str {
        match self {
            Source::Bbc => "https://www.bbc.com/news/world",
            Source::Cbs => "https://www.cbsnews.com/world/",
        }
    }

    pub fn is_article_url(self, url: &str) -> bool {
        match self {
            Source::Bbc => BBC_ARTICLE.is_match(url),
            Source::Cbs => CBS_ARTICLE.is_match(url),
        }
    }

    fn link_selector(self) -> &'static Selector {
        match self {
            Source::Bbc => &BBC_LINKS,
            Source::Cbs => &CBS_LINKS,
        }
    }

    /// Article links on a listing page, resolved against `page`, without
    /// fragments or query strings, deduplicated in document order.
    pub fn candidate_urls(self, html: &str, page: &Url) -> Vec<String> {
        let doc = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut urls = Vec::new();
        for a in doc.select(self.link_selector()) {
            let Some(href) = a.value().attr("href") else { continue };
            let Ok(mut u) = page.join(href.trim()) else { continue };
            u.set_fragment(None);
            u.set_query(None);
            let s = u.to_string();
            if self.is_article_url(&s) && seen.insert(s.clone()) {
                urls.push(s);
            }
        }
        urls
    }

    /// Header and body of an article page. Each paragraph contributes
    /// `"\n" + text` to the body.
    pub fn extract(self, html: &str, url: &str) -> Result<(String, String), AcquireError> {
        let doc = Html::parse_document(html);
        let (header_sel, header_name, body_sel, body_name) = match self {
            Source::Bbc => (&*BBC_HEADER, "h1", &*BBC_BODY, "article p"),
            Source::Cbs => (&*CBS_HEADER, ".content__title", &*CBS_BODY, ".content__body p"),
        };
        let header = doc
            .select(header_sel)
            .next()
            .map(|n| n.text().collect::<String>().trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AcquireError::MissingNode { url: url.to_string(), selector: header_name })?;

        let mut body = String::new();
        let mut paragraphs = 0;
        for p in doc.select(body_sel) {
            if self == Source::Cbs && is_cbs_boilerplate(&p) {
                continue;
            }
            paragraphs += 1;
            body.push('\n');
            body.push_str(p.text().collect::<String>().trim());
        }
        if paragraphs == 0 {
            return Err(AcquireError::MissingNode { url: url.to_string(), selector: body_name });
        }
        Ok((header, body))
    }
}

fn has_class(el: &ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

fn is_cbs_boilerplate(p: &ElementRef<'_>) -> bool {
    has_class(p, "content__copyright") || p.parent().and_then(ElementRef::wrap).map_or(false, |parent| has_class(&parent, "content__footer"))
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbc_listing_resolves_and_filters() {
        let html = r##"<div id="index-page">
            <a href="/news/world-europe-68123456">one</a>
            <a href="/news/world-europe-68123456#comments">dup</a>
            <a href="https://www.bbc.com/news/articles/c4n3r2x1">two</a>
            <a href="/sport/football">not news</a>
            <a href="/news/live/world-123">live</a>
        </div><a href="/news/outside-1">outside</a>"##;
        let page = Url::parse(Source::Bbc.listing_url()).unwrap();
        assert_eq!(
            Source::Bbc.candidate_urls(html, &page),
            vec!["https://www.bbc.com/news/world-europe-68123456", "https://www.bbc.com/news/articles/c4n3r2x1"]
        );
    }

    #[test]
    fn bbc_extraction_joins_paragraphs() {
        let html = "<html><body><h1> Floods hit coast </h1><article><p>First.</p><p>Second.</p></article><p>footer</p></body></html>";
        let (header, body) = Source::Bbc.extract(html, "u").unwrap();
        assert_eq!(header, "Floods hit coast");
        assert_eq!(body, "\nFirst.\nSecond.");
    }

    #[test]
    fn cbs_extraction_skips_boilerplate() {
        let html = r#"<h1 class="content__title">Storm</h1>
            <section class="content__body">
              <p>Rain fell.</p>
              <p class="content__copyright">(c) CBS</p>
              <div class="content__footer"><p>Share this</p></div>
              <p>Roads closed.</p>
            </section>"#;
        let (header, body) = Source::Cbs.extract(html, "u").unwrap();
        assert_eq!(header, "Storm");
        assert_eq!(body, "\nRain fell.\nRoads closed.");
    }

    #[test]
    fn missing_content_is_an_integrity_failure() {
        let err = Source::Bbc.extract("<h1>Only a title</h1>", "https://www.bbc.com/news/x-1").unwrap_err();
        assert!(err.is_integrity());
        let err = Source::Cbs.extract("<p>no title</p>", "u").unwrap_err();
        assert!(matches!(err, AcquireError::MissingNode { selector: ".content__title", .. }));
    }

    #[test]
    fn names_round_trip() {
        for s in Source::ALL {
            assert_eq!(Source::from_name(s.name()), Some(s));
        }
        assert_eq!(Source::from_name("reuters"), None);
    }
}
