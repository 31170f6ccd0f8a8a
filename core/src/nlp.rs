//! Part-of-speech tagging and lemmatization.
//!
//! Both are consumed through traits so a heavier tagger can be swapped in;
//! the defaults here are a lexicon + suffix tagger in the spirit of a Brill
//! baseline and a rule-based lemmatizer with an irregular-form table.

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedWord {
    pub token: String,
    pub tag: String,
}

pub trait PosTagger: Send + Sync {
    fn tag(&self, tokens: &[String]) -> Vec<TaggedWord>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordClass {
    Verb,
    Adjective,
    Noun,
}

pub trait Lemmatizer: Send + Sync {
    fn lemmatize(&self, token: &str, class: WordClass) -> String;
}

/// Maps Penn tags to the handling the tagging stage applies.
#[derive(Debug, Clone)]
pub struct TagClasses {
    closed: HashSet<String>,
    verbs: HashSet<String>,
    adjectives: HashSet<String>,
}

impl TagClasses {
    pub fn new<I, S>(closed: I, verbs: I, adjectives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            closed: closed.into_iter().map(Into::into).collect(),
            verbs: verbs.into_iter().map(Into::into).collect(),
            adjectives: adjectives.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_closed(&self, tag: &str) -> bool { self.closed.contains(tag) }

    /// Verbs as verbs, adjectives and adverbs as adjectives, the rest as nouns.
    pub fn class_of(&self, tag: &str) -> WordClass {
        if self.verbs.contains(tag) {
            WordClass::Verb
        } else if self.adjectives.contains(tag) {
            WordClass::Adjective
        } else {
            WordClass::Noun
        }
    }
}

lazy_static! {
    static ref LEXICON: HashMap<&'static str, &'static str> = {
        let groups: &[(&str, &[&str])] = &[
            ("DT", &["the", "a", "an", "this", "that", "these", "those", "every", "each", "some", "any", "no", "another", "either", "neither"]),
            ("PDT", &["all", "both", "half", "such"]),
            ("CC", &["and", "or", "but", "nor", "yet", "plus"]),
            ("IN", &["of", "in", "on", "at", "by", "for", "with", "from", "into", "about", "over", "after", "before", "under", "between", "through", "during", "against", "without", "within", "among", "since", "until", "while", "because", "if", "than", "as", "whether", "though", "although", "upon", "across", "behind", "near"]),
            ("TO", &["to"]),
            ("PRP", &["i", "you", "he", "she", "it", "we", "they", "me", "him", "us", "them", "myself", "yourself", "himself", "herself", "itself", "ourselves", "themselves"]),
            ("PRP$", &["my", "your", "his", "her", "its", "our", "their"]),
            ("WDT", &["which", "whatever", "whichever"]),
            ("WP", &["who", "whom", "what", "whoever"]),
            ("WP$", &["whose"]),
            ("WRB", &["when", "where", "why", "how", "whenever", "wherever"]),
            ("MD", &["can", "could", "may", "might", "must", "shall", "should", "will", "would"]),
            ("EX", &["there"]),
            ("UH", &["oh", "ah", "wow", "hey", "yes", "ok"]),
            ("RP", &["up", "off", "out", "down"]),
            ("POS", &["'s", "’s"]),
            ("RB", &["not", "very", "also", "just", "too", "never", "always", "often", "already", "still", "even", "now", "then", "here", "again", "soon"]),
            ("VB", &["be"]),
            ("VBZ", &["is", "has", "does", "says"]),
            ("VBP", &["are", "am", "have", "do"]),
            ("VBD", &["was", "were", "had", "did", "said", "made", "took", "went", "came", "saw", "told", "got", "gave", "found", "thought", "knew", "began", "left", "kept", "held", "brought", "wrote", "fell", "won", "lost", "paid", "met", "led", "sat", "stood", "spent", "built", "sent", "ran"]),
            ("VBN", &["been", "done", "gone", "taken", "seen", "given", "known", "written", "fallen"]),
            ("VBG", &["being", "having", "doing"]),
        ];
        let mut map = HashMap::new();
        for (tag, words) in groups {
            for w in *words { map.insert(*w, *tag); }
        }
        map
    };
    static ref IRREGULAR_VERBS: HashMap<&'static str, &'static str> = [
        ("is", "be"), ("are", "be"), ("am", "be"), ("was", "be"), ("were", "be"), ("been", "be"), ("being", "be"),
        ("has", "have"), ("had", "have"), ("having", "have"), ("does", "do"), ("did", "do"), ("done", "do"),
        ("went", "go"), ("gone", "go"), ("said", "say"), ("says", "say"), ("made", "make"), ("took", "take"), ("taken", "take"),
        ("came", "come"), ("saw", "see"), ("seen", "see"), ("ran", "run"), ("got", "get"), ("gotten", "get"),
        ("gave", "give"), ("given", "give"), ("knew", "know"), ("known", "know"), ("told", "tell"), ("found", "find"),
        ("thought", "think"), ("began", "begin"), ("begun", "begin"), ("left", "leave"), ("kept", "keep"), ("held", "hold"),
        ("brought", "bring"), ("wrote", "write"), ("written", "write"), ("fell", "fall"), ("fallen", "fall"), ("won", "win"),
        ("lost", "lose"), ("paid", "pay"), ("met", "meet"), ("led", "lead"), ("sat", "sit"), ("stood", "stand"),
        ("spent", "spend"), ("built", "build"), ("sent", "send"), ("bought", "buy"), ("caught", "catch"), ("fought", "fight"),
    ]
    .into_iter()
    .collect();
    static ref IRREGULAR_NOUNS: HashMap<&'static str, &'static str> = [
        ("men", "man"), ("women", "woman"), ("children", "child"), ("feet", "foot"), ("teeth", "tooth"),
        ("mice", "mouse"), ("geese", "goose"), ("data", "datum"), ("crises", "crisis"), ("analyses", "analysis"),
    ]
    .into_iter()
    .collect();
    static ref IRREGULAR_ADJECTIVES: HashMap<&'static str, &'static str> = [
        ("better", "good"), ("best", "good"), ("worse", "bad"), ("worst", "bad"), ("further", "far"), ("farther", "far"),
    ]
    .into_iter()
    .collect();
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconTagger;

impl LexiconTagger {
    fn tag_word(token: &str) -> &'static str {
        let lower = token.to_lowercase();
        if let Some(tag) = LEXICON.get(lower.as_str()) {
            return tag;
        }
        if token.chars().next().map_or(false, |c| c.is_numeric()) {
            return "CD";
        }
        if token.chars().next().map_or(false, |c| c.is_uppercase()) {
            return if lower.ends_with('s') && token.len() > 3 { "NNPS" } else { "NNP" };
        }
        let suffix_rules: &[(&str, &str)] = &[
            ("ly", "RB"),
            ("ing", "VBG"),
            ("ed", "VBD"),
            ("est", "JJS"),
            ("able", "JJ"),
            ("ible", "JJ"),
            ("ous", "JJ"),
            ("ful", "JJ"),
            ("ive", "JJ"),
            ("less", "JJ"),
            ("ish", "JJ"),
            ("ic", "JJ"),
            ("al", "JJ"),
        ];
        for (suffix, tag) in suffix_rules {
            if lower.len() > suffix.len() + 2 && lower.ends_with(suffix) {
                return tag;
            }
        }
        if lower.len() > 3 && lower.ends_with('s') && !lower.ends_with("ss") && !lower.ends_with("us") && !lower.ends_with("is") {
            return "NNS";
        }
        "NN"
    }
}

impl PosTagger for LexiconTagger {
    fn tag(&self, tokens: &[String]) -> Vec<TaggedWord> {
        let mut tagged: Vec<TaggedWord> = tokens
            .iter()
            .map(|t| TaggedWord { token: t.clone(), tag: Self::tag_word(t).to_string() })
            .collect();
        // contextual pass: a bare noun right after `to` or a modal is a verb
        for i in 1..tagged.len() {
            let prev = tagged[i - 1].tag.as_str();
            if (prev == "TO" || prev == "MD") && tagged[i].tag == "NN" {
                tagged[i].tag = "VB".to_string();
            }
        }
        tagged
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RuleLemmatizer;

fn is_vowel(c: u8) -> bool { matches!(c, b'a' | b'e' | b'i' | b'o' | b'u') }

/// Undoes consonant doubling ("runn" -> "run") and restores a dropped
/// silent `e` on short consonant-vowel-consonant stems ("mak" -> "make").
fn repair_stem(stem: &str) -> String {
    let b = stem.as_bytes();
    let n = b.len();
    if n >= 3 && b[n - 1] == b[n - 2] && !is_vowel(b[n - 1]) && !matches!(b[n - 1], b'l' | b's' | b'z') {
        return stem[..n - 1].to_string();
    }
    if n == 3 && !is_vowel(b[0]) && is_vowel(b[1]) && !is_vowel(b[2]) && !matches!(b[2], b'w' | b'x' | b'y') {
        return format!("{stem}e");
    }
    stem.to_string()
}

impl RuleLemmatizer {
    fn verb(word: &str) -> String {
        if let Some(l) = IRREGULAR_VERBS.get(word) {
            return l.to_string();
        }
        if word.len() > 4 && word.ends_with("ies") {
            return format!("{}y", &word[..word.len() - 3]);
        }
        if word.len() > 4 && word.ends_with("ied") {
            return format!("{}y", &word[..word.len() - 3]);
        }
        if word.len() > 5 && word.ends_with("ing") {
            return repair_stem(&word[..word.len() - 3]);
        }
        if word.len() > 4 && word.ends_with("ed") {
            return repair_stem(&word[..word.len() - 2]);
        }
        if word.len() > 4 && (word.ends_with("ches") || word.ends_with("shes") || word.ends_with("sses") || word.ends_with("xes")) {
            return word[..word.len() - 2].to_string();
        }
        if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
            return word[..word.len() - 1].to_string();
        }
        word.to_string()
    }

    fn adjective(word: &str) -> String {
        if let Some(l) = IRREGULAR_ADJECTIVES.get(word) {
            return l.to_string();
        }
        if word.len() > 5 && word.ends_with("iest") {
            return format!("{}y", &word[..word.len() - 4]);
        }
        if word.len() > 4 && word.ends_with("ier") {
            return format!("{}y", &word[..word.len() - 3]);
        }
        if word.len() > 5 && word.ends_with("est") {
            return repair_stem(&word[..word.len() - 3]);
        }
        if word.len() > 5 && word.ends_with("er") {
            return repair_stem(&word[..word.len() - 2]);
        }
        word.to_string()
    }

    fn noun(word: &str) -> String {
        if let Some(l) = IRREGULAR_NOUNS.get(word) {
            return l.to_string();
        }
        if word.len() > 4 && word.ends_with("ies") {
            return format!("{}y", &word[..word.len() - 3]);
        }
        if word.len() > 4 && (word.ends_with("ches") || word.ends_with("shes") || word.ends_with("sses") || word.ends_with("xes") || word.ends_with("zes")) {
            return word[..word.len() - 2].to_string();
        }
        if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") && !word.ends_with("is") {
            return word[..word.len() - 1].to_string();
        }
        word.to_string()
    }
}

impl Lemmatizer for RuleLemmatizer {
    fn lemmatize(&self, token: &str, class: WordClass) -> String {
        let word = token.to_lowercase();
        if !word.is_ascii() {
            return word;
        }
        match class {
            WordClass::Verb => Self::verb(&word),
            WordClass::Adjective => Self::adjective(&word),
            WordClass::Noun => Self::noun(&word),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(text: &[&str]) -> Vec<String> {
        let tokens: Vec<String> = text.iter().map(|s| s.to_string()).collect();
        LexiconTagger.tag(&tokens).into_iter().map(|t| t.tag).collect()
    }

    #[test]
    fn tags_function_words_as_closed_class() {
        assert_eq!(tags(&["the", "dogs", "and", "I"]), vec!["DT", "NNS", "CC", "PRP"]);
    }

    #[test]
    fn tags_open_class_by_shape() {
        assert_eq!(tags(&["quickly", "running", "Geneva", "2024", "walked", "beautiful"]), vec!["RB", "VBG", "NNP", "CD", "VBD", "JJ"]);
    }

    #[test]
    fn noun_after_modal_becomes_verb() {
        assert_eq!(tags(&["we", "will", "run"]), vec!["PRP", "MD", "VB"]);
    }

    #[test]
    fn lemmatizes_by_class() {
        let l = RuleLemmatizer;
        assert_eq!(l.lemmatize("running", WordClass::Verb), "run");
        assert_eq!(l.lemmatize("making", WordClass::Verb), "make");
        assert_eq!(l.lemmatize("walked", WordClass::Verb), "walk");
        assert_eq!(l.lemmatize("stopped", WordClass::Verb), "stop");
        assert_eq!(l.lemmatize("studies", WordClass::Verb), "study");
        assert_eq!(l.lemmatize("was", WordClass::Verb), "be");
        assert_eq!(l.lemmatize("Cities", WordClass::Noun), "city");
        assert_eq!(l.lemmatize("boxes", WordClass::Noun), "box");
        assert_eq!(l.lemmatize("children", WordClass::Noun), "child");
        assert_eq!(l.lemmatize("virus", WordClass::Noun), "virus");
        assert_eq!(l.lemmatize("bigger", WordClass::Adjective), "big");
        assert_eq!(l.lemmatize("happiest", WordClass::Adjective), "happy");
        assert_eq!(l.lemmatize("best", WordClass::Adjective), "good");
    }

    #[test]
    fn classes_follow_tag_groups() {
        let classes = TagClasses::new(vec!["DT", "IN"], vec!["VB", "VBD"], vec!["JJ", "RB"]);
        assert!(classes.is_closed("DT"));
        assert_eq!(classes.class_of("VBD"), WordClass::Verb);
        assert_eq!(classes.class_of("RB"), WordClass::Adjective);
        assert_eq!(classes.class_of("FW"), WordClass::Noun);
    }
}
