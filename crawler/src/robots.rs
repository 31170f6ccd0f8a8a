//! Minimal robots.txt support for the `*` user-agent group.

use std::time::{Duration, Instant};

/// Cached rules are refetched after this long.
pub const ROBOTS_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct Robots {
    pub fetched_at: Instant,
    allows: Vec<String>,
    disallows: Vec<String>,
    pub crawl_delay_ms: Option<u64>,
}

impl Robots {
    /// No rules: everything allowed. Used when robots.txt is missing.
    pub fn permissive() -> Self { Self::parse("") }

    pub fn parse(txt: &str) -> Self {
        let mut active = false;
        let mut allows = Vec::new();
        let mut disallows = Vec::new();
        let mut crawl_delay_ms = None;
        for line in txt.lines() {
            let l = line.split('#').next().unwrap_or("").trim();
            if l.is_empty() {
                continue;
            }
            let Some((k, v)) = l.split_once(':') else { continue };
            let val = v.trim();
            match k.trim().to_lowercase().as_str() {
                "user-agent" => active = val == "*",
                "allow" if active && !val.is_empty() => allows.push(val.to_string()),
                "disallow" if active && !val.is_empty() => disallows.push(val.to_string()),
                "crawl-delay" if active => {
                    if let Ok(n) = val.parse::<f64>() {
                        crawl_delay_ms = Some((n * 1000.0) as u64);
                    }
                }
                _ => {}
            }
        }
        Self { fetched_at: Instant::now(), allows, disallows, crawl_delay_ms }
    }

    pub fn is_stale(&self) -> bool { self.fetched_at.elapsed() > ROBOTS_TTL }

    /// Longest matching rule wins; an Allow beats a Disallow of equal length.
    pub fn allows(&self, path: &str) -> bool {
        let longest = |rules: &[String]| rules.iter().filter(|r| path.starts_with(r.as_str())).map(|r| r.len()).max();
        match (longest(&self.allows), longest(&self.disallows)) {
            (Some(a), Some(d)) => a >= d,
            (_, None) => true,
            (None, Some(_)) => false,
        }
    }
}
