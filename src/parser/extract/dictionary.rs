//! Case-insensitive, word-bounded dictionary matching over content blocks.
//!
//! Every canonical name and alias becomes a pattern in one Aho-Corasick
//! automaton per dictionary. All overlapping hits are collected, hits that
//! sit inside a longer word are dropped, then the survivors are resolved
//! left to right with the longest alias winning at a given start offset.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use aho_corasick::{AhoCorasick, MatchKind};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::CorpusError;
use crate::utils::normalize_name;

const BUILTIN_DICTIONARY: &str = include_str!("../../../data/dictionary.json");

/// One resolved hit; offsets are byte offsets into the scanned text.
#[derive(Debug, Clone, PartialEq)]
pub struct DictMatch {
    pub start: usize,
    pub end: usize,
    pub canonical: String,
    /// Text as it appears in the block.
    pub surface: String,
}

pub struct Dictionary {
    entries: BTreeMap<String, BTreeSet<String>>,
    automaton: AhoCorasick,
    /// Pattern index → canonical name.
    pattern_canonical: Vec<String>,
}

impl Dictionary {
    pub fn new(raw: &BTreeMap<String, Vec<String>>) -> Result<Self, CorpusError> {
        let mut entries: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (canonical, aliases) in raw {
            let canonical = normalize_name(canonical);
            if canonical.is_empty() {
                return Err(CorpusError::Dictionary("empty canonical name".into()));
            }
            let set = entries.entry(canonical.clone()).or_default();
            set.extend(
                aliases
                    .iter()
                    .map(|a| normalize_name(a))
                    .filter(|a| !a.is_empty() && *a != canonical),
            );
        }

        let mut patterns: Vec<String> = Vec::new();
        let mut pattern_canonical: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for (canonical, aliases) in &entries {
            for pattern in std::iter::once(canonical).chain(aliases) {
                if !seen.insert(pattern.clone()) {
                    warn!(pattern = %pattern, canonical = %canonical, "Alias already claimed; skipped");
                    continue;
                }
                patterns.push(pattern.clone());
                pattern_canonical.push(canonical.clone());
            }
        }

        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .ascii_case_insensitive(true)
            .build(&patterns)
            .map_err(|e| CorpusError::Dictionary(e.to_string()))?;

        Ok(Dictionary {
            entries,
            automaton,
            pattern_canonical,
        })
    }

    /// All non-overlapping, word-bounded matches in `text`, ordered by offset.
    pub fn find(&self, text: &str) -> Vec<DictMatch> {
        // Line breaks inside a multi-word name still match; same byte length.
        let haystack: Vec<u8> = text
            .bytes()
            .map(|b| if matches!(b, b'\n' | b'\r' | b'\t') { b' ' } else { b })
            .collect();

        let mut hits: Vec<(usize, usize, usize)> = self
            .automaton
            .find_overlapping_iter(&haystack)
            .filter(|m| is_word_bounded(text, m.start(), m.end()))
            .map(|m| (m.start(), m.end(), m.pattern().as_usize()))
            .collect();
        hits.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));

        let mut out: Vec<DictMatch> = Vec::new();
        let mut last_end = 0;
        for (start, end, pattern) in hits {
            if !out.is_empty() && start < last_end {
                continue;
            }
            last_end = end;
            out.push(DictMatch {
                start,
                end,
                canonical: self.pattern_canonical[pattern].clone(),
                surface: text[start..end].to_string(),
            });
        }
        out
    }

    pub fn aliases(&self, canonical: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(canonical)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

#[derive(Debug, Deserialize)]
struct DictionaryFile {
    #[serde(default)]
    drugs: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    conditions: BTreeMap<String, Vec<String>>,
}

/// The two read-only reference tables handed to the pipeline.
pub struct Dictionaries {
    pub drugs: Dictionary,
    pub conditions: Dictionary,
}

impl Dictionaries {
    pub fn builtin() -> Result<Self, CorpusError> {
        Self::from_json(BUILTIN_DICTIONARY)
    }

    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CorpusError> {
        let file: DictionaryFile =
            serde_json::from_str(raw).map_err(|e| CorpusError::Dictionary(e.to_string()))?;
        let dicts = Dictionaries {
            drugs: Dictionary::new(&file.drugs)?,
            conditions: Dictionary::new(&file.conditions)?,
        };
        if dicts.drugs.is_empty() || dicts.conditions.is_empty() {
            warn!("A reference dictionary is empty; its entities will not be extracted");
        }
        info!(
            drugs = dicts.drugs.len(),
            conditions = dicts.conditions.len(),
            "Reference dictionaries loaded"
        );
        Ok(dicts)
    }
}
