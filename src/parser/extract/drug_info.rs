//! Per-mention drug facts read from the surrounding sentence.
//!
//! A mention printed as `generic [Brand] (formulations)` yields a brand alias
//! and a formulation string. The mention's sentence is searched for an
//! indication clause and an adverse-effect clause. Nothing is filled in when
//! the text does not say it.

use std::sync::LazyLock;

use regex::Regex;

use super::dictionary::DictMatch;

/// `[Amoxil] (250 mg/5 mL suspension)` right after the generic name.
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*\[([^\[\]\n]{1,40})\](?:[ \t]*\(([^()\n]{1,80})\))?").unwrap()
});
static SENTENCE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?](?:\s|$)|\n\s*\n").unwrap());
static INDICATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:indicated|used|recommended)\s+(?:for|in|to\s+treat)\s+([^.;:]+)").unwrap()
});
static ADVERSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:adverse\s+effects|side\s+effects|adverse\s+reactions)\b[^.;]*?\b(?:include|includes|are)\s+([^.;]+)").unwrap()
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrugFacts {
    pub brand: Option<String>,
    pub formulations: Option<String>,
    pub indication: Option<String>,
    pub adverse_effects: Option<String>,
}

impl DrugFacts {
    pub fn is_empty(&self) -> bool {
        self == &DrugFacts::default()
    }
}

pub fn drug_facts(text: &str, mention: &DictMatch) -> DrugFacts {
    let mut facts = DrugFacts::default();

    if let Some(caps) = LABEL_RE.captures(&text[mention.end..]) {
        facts.brand = clean(&caps[1]);
        facts.formulations = caps.get(2).and_then(|m| clean(m.as_str()));
    }

    let sentence = sentence_around(text, mention.start, mention.end);
    facts.indication = INDICATION_RE
        .captures(sentence)
        .and_then(|c| clean(&c[1]));
    facts.adverse_effects = ADVERSE_RE.captures(sentence).and_then(|c| clean(&c[1]));
    facts
}

/// The sentence holding `start..end`, bounded by terminal punctuation or a blank line.
fn sentence_around(text: &str, start: usize, end: usize) -> &str {
    let from = SENTENCE_END_RE
        .find_iter(&text[..start])
        .last()
        .map_or(0, |m| m.end());
    let to = SENTENCE_END_RE
        .find(&text[end..])
        .map_or(text.len(), |m| end + m.start() + 1);
    &text[from..to]
}

/// Collapse whitespace; empty clauses are absent.
fn clean(raw: &str) -> Option<String> {
    let s = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!s.is_empty()).then_some(s)
}
