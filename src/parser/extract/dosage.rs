//! Dosage phrases near drug mentions.
//!
//! The grammar is an ordered table of patterns, most specific first. For each
//! drug mention a window of surrounding text is searched pattern by pattern;
//! the first pattern with an unclaimed match wins the window. A matched
//! phrase may be followed by further phrases of the same shape joined by a
//! list delimiter (`;`, `,`, `or`, `and`), each of which yields its own row.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::dictionary::DictMatch;
use crate::error::CorpusError;
use crate::parser::ExtractSettings;

pub const GRAMMAR_VERSION: &str = "dosage-v1";

// Building blocks, spliced into the pattern templates below.
const RANGE: &str = r"\d+(?:\.\d+)?(?:\s*(?:-|–|to)\s*\d+(?:\.\d+)?)?";
const UNIT: &str = r"(?:mg|mcg|µg|g|mEq|mmol|mL|L|IU|units?)\b(?:/(?:kg|dose|day|m2|24\s*hr|hr|h|min))*";
const ROUTE: &str = r"\b(?:PO|IV|IM|SC|SQ|PR|SL|NG|ET|(?i:orally|oral|intravenously|intravenous|intramuscularly|intramuscular|subcutaneously|subcutaneous|topically|topical|inhaled|intranasally|intranasal|rectally|rectal|sublingual))\b";
const FREQ: &str = r"\b(?i:q\s?\d+(?:\s*-\s*\d+)?\s*(?:hours|hour|hrs|hr|h)|every\s+\d+(?:\s*-\s*\d+)?\s*(?:hours|hour|hrs|hr|h|days|day|weeks|week)|(?:once|twice|three\s+times|four\s+times)\s+(?:daily|a\s+day)|qid|tid|bid|qd|daily)\b";
const AGE: &str = r"(?:\b(?i:neonates|neonate|infants|infant|children|child|adolescents|adolescent|adults|adult)\s+)?(?:[<>≤≥]=?\s*)?\b\d+(?:\s*(?:-|–|to)\s*\d+)?\s*(?i:years|year|yrs|yr|months|month|mo|weeks|week|wk|days|day)\b(?:\s+old\b)?";
const WEIGHT: &str = r"(?:[<>≤≥]=?\s*)?\b\d+(?:\.\d+)?(?:\s*(?:-|–|to)\s*\d+(?:\.\d+)?)?\s*kg\b";
const GAP: &str = r"[\s:,()]{0,6}";
const DIVIDED: &str = r"(?:(?i:divided)\s+)?";

static MAX_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"(?i:\bnot\s+to\s+exceed|\bmax(?:imum)?(?:\s+(?:daily|single))?(?:\s+dose)?)\s*:?\s*(?P<value>{}\s*{})",
        RANGE, UNIT
    );
    Regex::new(&pattern).unwrap()
});
static SPECIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:caution|warning|note|adjust|monitor|avoid|reduce)\w*\b[^.;\n]*").unwrap()
});
static LIST_DELIM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[;,]\s*(?:(?:or|and)\s+)?|(?:or|and)\s+)").unwrap()
});
static SENTENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.(?:\s|$)").unwrap());

/// A capture a pattern must provide for its match to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Age,
    Weight,
    Route,
    Value,
    Frequency,
}

impl Field {
    fn group(self) -> &'static str {
        match self {
            Field::Age => "age",
            Field::Weight => "weight",
            Field::Route => "route",
            Field::Value => "value",
            Field::Frequency => "freq",
        }
    }
}

#[derive(Debug)]
pub struct DosagePattern {
    pub tier: u8,
    pub name: &'static str,
    pub regex: Regex,
    pub requires: &'static [Field],
}

impl DosagePattern {
    /// Compile a template. `%AGE%`, `%WEIGHT%`, `%ROUTE%`, `%VALUE%`,
    /// `%FREQ%`, `%GAP%` and `%DIV%` expand to the shared sub-patterns.
    pub fn new(
        tier: u8,
        name: &'static str,
        template: &str,
        requires: &'static [Field],
    ) -> Result<Self, CorpusError> {
        let value = format!("{}\\s*{}", RANGE, UNIT);
        let source = template
            .replace("%AGE%", AGE)
            .replace("%WEIGHT%", WEIGHT)
            .replace("%ROUTE%", ROUTE)
            .replace("%VALUE%", &value)
            .replace("%FREQ%", FREQ)
            .replace("%GAP%", GAP)
            .replace("%DIV%", DIVIDED);
        let regex = Regex::new(&source)
            .map_err(|e| CorpusError::Grammar(format!("{}: {}", name, e)))?;

        let groups: Vec<&str> = regex.capture_names().flatten().collect();
        if !requires.contains(&Field::Value) {
            return Err(CorpusError::Grammar(format!("{}: value is not required", name)));
        }
        if let Some(missing) = requires.iter().find(|f| !groups.contains(&f.group())) {
            return Err(CorpusError::Grammar(format!(
                "{}: required group `{}` missing",
                name,
                missing.group()
            )));
        }
        Ok(DosagePattern {
            tier,
            name,
            regex,
            requires,
        })
    }
}

/// One extracted dosage; offsets are byte offsets into the block text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DosageHit {
    pub start: usize,
    pub end: usize,
    pub age_group: Option<String>,
    pub route: Option<String>,
    pub value: String,
    pub max: Option<String>,
    pub frequency: Option<String>,
    pub special_considerations: Option<String>,
    /// `<grammar version>/<pattern name>`.
    pub pattern: String,
}

#[derive(Debug)]
pub struct DosageGrammar {
    version: &'static str,
    patterns: Vec<DosagePattern>,
}

impl DosageGrammar {
    pub fn new(version: &'static str, patterns: Vec<DosagePattern>) -> Result<Self, CorpusError> {
        if patterns.is_empty() {
            return Err(CorpusError::Grammar("no patterns".into()));
        }
        if patterns.windows(2).any(|w| w[0].tier > w[1].tier) {
            return Err(CorpusError::Grammar("patterns must be ordered by tier".into()));
        }
        Ok(DosageGrammar { version, patterns })
    }

    pub fn standard() -> Result<Self, CorpusError> {
        use Field::*;
        let patterns = vec![
            DosagePattern::new(
                1,
                "age_route_value_freq",
                r"(?P<age>%AGE%)%GAP%(?P<route>%ROUTE%)%GAP%(?P<value>%VALUE%)%GAP%%DIV%(?P<freq>%FREQ%)",
                &[Age, Route, Value, Frequency],
            )?,
            DosagePattern::new(
                1,
                "age_value_route_freq",
                r"(?P<age>%AGE%)%GAP%(?P<value>%VALUE%)%GAP%(?P<route>%ROUTE%)%GAP%%DIV%(?P<freq>%FREQ%)",
                &[Age, Route, Value, Frequency],
            )?,
            DosagePattern::new(
                2,
                "weight_value_freq",
                r"(?P<weight>%WEIGHT%)%GAP%(?P<value>%VALUE%)%GAP%(?:(?P<route>%ROUTE%)%GAP%)?%DIV%(?P<freq>%FREQ%)",
                &[Weight, Value, Frequency],
            )?,
            DosagePattern::new(
                2,
                "age_value_freq",
                r"(?P<age>%AGE%)%GAP%(?P<value>%VALUE%)%GAP%%DIV%(?P<freq>%FREQ%)",
                &[Age, Value, Frequency],
            )?,
            DosagePattern::new(
                3,
                "route_value_freq",
                r"(?P<route>%ROUTE%)%GAP%(?P<value>%VALUE%)%GAP%%DIV%(?P<freq>%FREQ%)",
                &[Route, Value, Frequency],
            )?,
            DosagePattern::new(
                3,
                "value_freq",
                r"(?P<value>%VALUE%)%GAP%(?:(?P<route>%ROUTE%)%GAP%)?%DIV%(?P<freq>%FREQ%)",
                &[Value, Frequency],
            )?,
            DosagePattern::new(
                4,
                "route_value",
                r"(?P<route>%ROUTE%)%GAP%(?P<value>%VALUE%)",
                &[Route, Value],
            )?,
            DosagePattern::new(
                4,
                "value_route",
                r"(?P<value>%VALUE%)%GAP%(?P<route>%ROUTE%)",
                &[Route, Value],
            )?,
        ];
        Self::new(GRAMMAR_VERSION, patterns)
    }

    pub fn version(&self) -> &str {
        self.version
    }

    pub fn patterns(&self) -> &[DosagePattern] {
        &self.patterns
    }

    /// Dosages for every drug mention in `text`, tagged with the index of
    /// the mention in `drugs` they belong to.
    pub fn extract(
        &self,
        text: &str,
        drugs: &[DictMatch],
        settings: &ExtractSettings,
    ) -> Vec<(usize, DosageHit)> {
        let mut claimed: Vec<(usize, usize)> = Vec::new();
        let mut out = Vec::new();

        for (i, drug) in drugs.iter().enumerate() {
            let mut start = back_chars(text, drug.start, settings.window_before);
            let mut end = forward_chars(text, drug.end, settings.window_after);
            if i > 0 {
                start = start.max(drugs[i - 1].end);
            }
            if let Some(next) = drugs.get(i + 1) {
                end = end.min(next.start);
            }
            if start >= end {
                continue;
            }
            for hit in self.match_window(text, start, end, &claimed) {
                claimed.push((hit.start, hit.end));
                out.push((i, hit));
            }
        }
        out
    }

    /// Rows for one window; empty when the grammar is exhausted.
    fn match_window(
        &self,
        text: &str,
        start: usize,
        end: usize,
        claimed: &[(usize, usize)],
    ) -> Vec<DosageHit> {
        let window = &text[start..end];
        let is_free = |s: usize, e: usize| claimed.iter().all(|&(cs, ce)| e <= cs || s >= ce);

        for pattern in &self.patterns {
            let Some(first) = pattern.regex.captures_iter(window).find(|c| {
                let m = c.get(0).map_or(0..0, |m| m.range());
                is_free(start + m.start, start + m.end)
            }) else {
                continue;
            };

            let mut rows: Vec<DosageHit> = Vec::new();
            let mut caps = first;
            loop {
                let Some(row) = self.hit_from(pattern, &caps, start) else {
                    break;
                };
                let row_end = row.end - start;
                rows.push(row);

                let Some(delim) = LIST_DELIM_RE.find(&window[row_end..]) else {
                    break;
                };
                let pos = row_end + delim.end();
                match pattern.regex.captures_at(window, pos) {
                    Some(next)
                        if next.get(0).is_some_and(|m| m.start() == pos)
                            && is_free(start + pos, start + next.get(0).map_or(pos, |m| m.end())) =>
                    {
                        caps = next;
                    }
                    _ => break,
                }
            }

            // Trailing qualifiers run to the next row, or to the sentence end.
            for idx in 0..rows.len() {
                let from = rows[idx].end - start;
                let to = rows.get(idx + 1).map_or(window.len(), |r| r.start - start);
                let tail = &window[from..to];
                let tail = SENTENCE_END_RE.find(tail).map_or(tail, |m| &tail[..m.start()]);
                rows[idx].max = MAX_RE
                    .captures(tail)
                    .and_then(|c| c.name("value"))
                    .map(|m| m.as_str().trim().to_string());
                rows[idx].special_considerations = SPECIAL_RE
                    .find(tail)
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty());
            }

            if !rows.is_empty() {
                return rows;
            }
        }
        Vec::new()
    }

    fn hit_from(&self, pattern: &DosagePattern, caps: &Captures, offset: usize) -> Option<DosageHit> {
        let whole = caps.get(0)?;
        if pattern.requires.iter().any(|f| caps.name(f.group()).is_none()) {
            return None;
        }
        let field = |name: &str| caps.name(name).map(|m| m.as_str().trim().to_string());
        Some(DosageHit {
            start: offset + whole.start(),
            end: offset + whole.end(),
            age_group: field("age").or_else(|| field("weight")),
            route: field("route"),
            value: field("value")?,
            max: None,
            frequency: field("freq"),
            special_considerations: None,
            pattern: format!("{}/{}", self.version, pattern.name),
        })
    }
}

/// Byte offset `n` characters before `from`.
fn back_chars(text: &str, from: usize, n: usize) -> usize {
    if n == 0 {
        return from;
    }
    text[..from]
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map_or(from, |(i, _)| i)
}

/// Byte offset `n` characters after `from`.
fn forward_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map_or(text.len(), |(i, _)| from + i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drug_at(text: &str, name: &str) -> DictMatch {
        let start = text.find(name).unwrap();
        DictMatch {
            start,
            end: start + name.len(),
            canonical: name.to_string(),
            surface: name.to_string(),
        }
    }

    fn extract(text: &str, names: &[&str]) -> Vec<(usize, DosageHit)> {
        let grammar = DosageGrammar::standard().unwrap();
        let drugs: Vec<DictMatch> = names.iter().map(|n| drug_at(text, n)).collect();
        grammar.extract(text, &drugs, &ExtractSettings::default())
    }

    fn pattern_name(hit: &DosageHit) -> &str {
        hit.pattern.split('/').nth(1).unwrap()
    }

    #[test]
    fn standard_grammar_is_ordered() {
        let g = DosageGrammar::standard().unwrap();
        assert_eq!(g.version(), GRAMMAR_VERSION);
        let tiers: Vec<u8> = g.patterns().iter().map(|p| p.tier).collect();
        assert_eq!(tiers.first(), Some(&1));
        assert_eq!(tiers.last(), Some(&4));
    }

    #[test]
    fn tier1_age_value_route_freq_with_max() {
        let text = "Acute otitis media is treated with amoxicillin 2-12 yr: 40-50 mg/kg/day PO q8h, max 500 mg/dose.";
        let hits = extract(text, &["amoxicillin"]);
        assert_eq!(hits.len(), 1);
        let h = &hits[0].1;
        assert_eq!(h.age_group.as_deref(), Some("2-12 yr"));
        assert_eq!(h.route.as_deref(), Some("PO"));
        assert_eq!(h.value, "40-50 mg/kg/day");
        assert_eq!(h.frequency.as_deref(), Some("q8h"));
        assert_eq!(h.max.as_deref(), Some("500 mg/dose"));
        assert_eq!(h.pattern, "dosage-v1/age_value_route_freq");
        assert!(h.special_considerations.is_none());
    }

    #[test]
    fn tier1_route_before_value() {
        let text = "gentamicin neonates 0-7 days: IV 2.5 mg/kg q12h";
        let hits = extract(text, &["gentamicin"]);
        let h = &hits[0].1;
        assert_eq!(pattern_name(h), "age_route_value_freq");
        assert_eq!(h.age_group.as_deref(), Some("neonates 0-7 days"));
        assert_eq!(h.route.as_deref(), Some("IV"));
        assert_eq!(h.value, "2.5 mg/kg");
    }

    #[test]
    fn tier2_weight_qualifier() {
        let text = "ceftriaxone <20 kg: 50 mg/kg IV daily";
        let hits = extract(text, &["ceftriaxone"]);
        let h = &hits[0].1;
        assert_eq!(pattern_name(h), "weight_value_freq");
        assert_eq!(h.age_group.as_deref(), Some("<20 kg"));
        assert_eq!(h.value, "50 mg/kg");
        assert_eq!(h.route.as_deref(), Some("IV"));
        assert_eq!(h.frequency.as_deref(), Some("daily"));
    }

    #[test]
    fn tier2_age_without_route() {
        let text = "azithromycin children 6 mo: 10 mg/kg once daily";
        let h = &extract(text, &["azithromycin"])[0].1;
        assert_eq!(pattern_name(h), "age_value_freq");
        assert_eq!(h.age_group.as_deref(), Some("children 6 mo"));
        assert!(h.route.is_none());
        assert_eq!(h.frequency.as_deref(), Some("once daily"));
    }

    #[test]
    fn tier3_bare_value_and_frequency() {
        let text = "ibuprofen 10 mg/kg PO q6-8h as needed";
        let h = &extract(text, &["ibuprofen"])[0].1;
        assert_eq!(pattern_name(h), "value_freq");
        assert!(h.age_group.is_none());
        assert_eq!(h.route.as_deref(), Some("PO"));
        assert_eq!(h.frequency.as_deref(), Some("q6-8h"));
    }

    #[test]
    fn tier4_route_and_value_only() {
        let text = "morphine IV 0.1 mg/kg for severe pain";
        let h = &extract(text, &["morphine"])[0].1;
        assert_eq!(pattern_name(h), "route_value");
        assert_eq!(h.value, "0.1 mg/kg");
        assert!(h.frequency.is_none());
    }

    #[test]
    fn list_delimiter_yields_one_row_per_pair() {
        let text = "acetaminophen 10-15 mg/kg q4-6h or 325-650 mg q4-6h, not to exceed 4 g/day.";
        let hits = extract(text, &["acetaminophen"]);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].1.value, "10-15 mg/kg");
        assert_eq!(hits[1].1.value, "325-650 mg");
        assert!(hits[0].1.max.is_none());
        assert_eq!(hits[1].1.max.as_deref(), Some("4 g/day"));
    }

    #[test]
    fn special_considerations_captured_when_present() {
        let text = "vancomycin 15 mg/kg IV q6h; monitor trough levels.";
        let h = &extract(text, &["vancomycin"])[0].1;
        assert_eq!(h.special_considerations.as_deref(), Some("monitor trough levels"));
    }

    #[test]
    fn neighbouring_mentions_do_not_share_a_dose() {
        let text = "amoxicillin 40 mg/kg/day q8h; cefdinir 14 mg/kg/day daily";
        let hits = extract(text, &["amoxicillin", "cefdinir"]);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[0].1.value, "40 mg/kg/day");
        assert_eq!(hits[1].0, 1);
        assert_eq!(hits[1].1.value, "14 mg/kg/day");
    }

    #[test]
    fn dose_outside_window_is_ignored() {
        let text = format!("amoxicillin is first line.{} Give 10 mg/kg q8h.", " filler".repeat(60));
        assert!(extract(&text, &["amoxicillin"]).is_empty());
    }

    #[test]
    fn no_dosage_is_not_an_error() {
        assert!(extract("amoxicillin remains the drug of choice.", &["amoxicillin"]).is_empty());
    }

    #[test]
    fn pattern_without_value_is_rejected() {
        let err = DosagePattern::new(9, "broken", r"(?P<route>%ROUTE%)", &[Field::Route]).unwrap_err();
        assert!(matches!(err, CorpusError::Grammar(_)));
        let err = DosagePattern::new(9, "broken", r"(?P<route>%ROUTE%)", &[Field::Value]).unwrap_err();
        assert!(matches!(err, CorpusError::Grammar(_)));
    }

    #[test]
    fn window_offsets_respect_char_boundaries() {
        let text = "µµµ amoxicillin";
        assert_eq!(back_chars(text, 6, 2), 2);
        assert_eq!(back_chars(text, 6, 50), 0);
        assert_eq!(forward_chars(text, 0, 2), 4);
        assert_eq!(forward_chars(text, 0, 500), text.len());
    }
}
