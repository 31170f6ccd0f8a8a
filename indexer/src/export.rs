//! Bulk export of the store as JSON arrays or an XML rendering of the index.

use anyhow::{bail, Context, Result};
use lemmadex_core::Store;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Article,
    Lemma,
    Stem,
    Document,
    Xml,
}

impl ExportKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ExportKind::Article => "article.json",
            ExportKind::Lemma => "lemma.json",
            ExportKind::Stem => "stem.json",
            ExportKind::Document => "document.json",
            ExportKind::Xml => "output.xml",
        }
    }
}

impl FromStr for ExportKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "article" => ExportKind::Article,
            "lemma" => ExportKind::Lemma,
            "stem" => ExportKind::Stem,
            "document" => ExportKind::Document,
            "xml" => ExportKind::Xml,
            other => bail!("unknown export type `{other}` (article, lemma, stem, document, xml)"),
        })
    }
}

/// Writes one record at a time so the collection never sits in memory.
fn write_array<T, I, W>(out: &mut W, items: I) -> Result<usize>
where
    T: Serialize,
    I: Iterator<Item = lemmadex_core::Result<T>>,
    W: Write,
{
    out.write_all(b"[")?;
    let mut n = 0;
    for item in items {
        if n > 0 {
            out.write_all(b",")?;
        }
        serde_json::to_writer(&mut *out, &item?)?;
        n += 1;
    }
    out.write_all(b"]")?;
    Ok(n)
}

pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn write_xml<W: Write>(out: &mut W, store: &Store) -> Result<usize> {
    out.write_all(b"<index>")?;
    let mut n = 0;
    for lemma in store.lemmas.iter() {
        let lemma = lemma?;
        write!(out, "<lemma term=\"{}\" appearances=\"{}\">", escape_attr(&lemma.term), lemma.total_appearances)?;
        for (id, posting) in &lemma.postings {
            write!(out, "<article id=\"{}\" appearances=\"{}\" weight=\"{}\"/>", id, posting.appearances, posting.weight)?;
        }
        out.write_all(b"</lemma>")?;
        n += 1;
    }
    out.write_all(b"</index>")?;
    Ok(n)
}

/// Exports one entity type into `dir` and returns the written path.
pub fn export(store: &Store, kind: ExportKind, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(kind.file_name());
    let mut out = BufWriter::new(File::create(&path).with_context(|| format!("creating {}", path.display()))?);
    let records = match kind {
        ExportKind::Article => write_array(&mut out, store.articles.iter())?,
        ExportKind::Lemma => write_array(&mut out, store.lemmas.iter())?,
        ExportKind::Stem => write_array(&mut out, store.stems.iter())?,
        ExportKind::Document => write_array(&mut out, store.documents.iter())?,
        ExportKind::Xml => write_xml(&mut out, store)?,
    };
    out.flush()?;
    info!(path = %path.display(), records, "exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_are_escaped() {
        assert_eq!(escape_attr(r#"AT&T "<x>""#), "AT&amp;T &quot;&lt;x&gt;&quot;");
    }

    #[test]
    fn parses_kinds() {
        assert_eq!("XML".parse::<ExportKind>().unwrap(), ExportKind::Xml);
        assert!("tags".parse::<ExportKind>().is_err());
    }
}
