use std::sync::LazyLock;

use regex::Regex;

use super::ExtractSettings;
use crate::utils::{parse_ordinal, NumberKey};

static VOLUME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:volume)\s+([0-9]{1,2}|[IVXLC]{1,6})\b\s*[.:\-–—]?\s*(.*)$").unwrap()
});
static PART_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:part)\s+([0-9]{1,2}|[IVXLC]{1,7})\b\s*[.:\-–—]?\s*(.*)$").unwrap()
});
static PART_ROMAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([IVXLC]{1,7})\.\s+(\p{Lu}.*)$").unwrap());
static CHAPTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^chapter\s+(\d{1,4})\b\s*[.:\-–—]?\s*(.*)$").unwrap()
});
static CHAPTER_BARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,4})\.?\s+(\p{Lu}[^.]*)$").unwrap());
static DOTTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,4}(?:\.\d{1,3}){1,2})\.?\s+(\p{Lu}.*)$").unwrap());
/// Units and regimen codes that never appear in a heading title.
static DOSE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:mg|mcg|µg|kg|ml|mmol|meq|iu)\b|/(?:kg|day|dose|m2)\b|%|\bq\d{1,2}h\b").unwrap()
});

/// Longest title, in words, a labelled heading may carry.
const MAX_TITLE_WORDS: usize = 12;
/// Bare-numeral chapters are list-item lookalikes; their titles stay short.
const MAX_BARE_TITLE_WORDS: usize = 8;
/// How far a bare-numeral chapter may jump past the open one.
const MAX_BARE_CHAPTER_JUMP: u32 = 5;

/// Lower-case words allowed inside a title-cased heading.
const CONNECTIVES: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "from", "in", "into", "of", "on", "or", "the",
    "to", "versus", "vs", "with", "without",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Volume,
    Part,
    Chapter,
    Section,
    Subsection,
}

impl Level {
    pub fn depth(self) -> u8 {
        self as u8
    }
}

/// Ordered low → high; candidates are ranked by this first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    /// Key inconsistent with the open path; the builder treats the line as body text.
    Demoted,
    /// ALL-CAPS short line without a numeric key.
    Fallback,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub level: Level,
    /// Label as printed: `"XII"`, `"14"`, `"14.3"`.
    pub label: Option<String>,
    pub key: Option<NumberKey>,
    pub title: String,
    pub confidence: Confidence,
}

/// The parts of the open hierarchy path the classifier checks keys against.
#[derive(Debug, Clone, Default)]
pub struct PathContext {
    pub part: Option<u32>,
    pub chapter: Option<NumberKey>,
    pub section: Option<NumberKey>,
}

/// Score one line against every heading pattern.
///
/// Returns candidates best-first: highest confidence, then deepest level.
/// An empty result means the line is body text.
pub fn classify_line(line: &str, ctx: &PathContext, settings: &ExtractSettings) -> Vec<Candidate> {
    let line = line.trim();
    if line.is_empty() || line.chars().count() > settings.max_heading_len {
        return Vec::new();
    }

    let mut out = Vec::new();

    if let Some(caps) = VOLUME_RE.captures(line) {
        if let Some(ordinal) = parse_ordinal(&caps[1]) {
            let title = caps[2].trim();
            out.push(Candidate {
                level: Level::Volume,
                label: Some(caps[1].to_string()),
                key: ordinal_key(ordinal),
                title: title.to_string(),
                confidence: shaped(title, Confidence::High),
            });
        }
    }

    if let Some(caps) = PART_RE.captures(line) {
        if let Some(ordinal) = parse_ordinal(&caps[1]) {
            let title = caps[2].trim();
            out.push(Candidate {
                level: Level::Part,
                label: Some(caps[1].to_string()),
                key: ordinal_key(ordinal),
                title: title.to_string(),
                confidence: shaped(title, Confidence::High),
            });
        }
    } else if let Some(caps) = PART_ROMAN_RE.captures(line) {
        if let Some(ordinal) = parse_ordinal(&caps[1]) {
            let advances = ctx.part.map_or(true, |open| ordinal > open);
            let title = caps[2].trim();
            out.push(Candidate {
                level: Level::Part,
                label: Some(caps[1].to_string()),
                key: ordinal_key(ordinal),
                title: title.to_string(),
                confidence: if advances { shaped(title, Confidence::Medium) } else { Confidence::Demoted },
            });
        }
    }

    if let Some(caps) = CHAPTER_RE.captures(line) {
        let title = caps[2].trim();
        out.push(Candidate {
            level: Level::Chapter,
            label: Some(caps[1].to_string()),
            key: NumberKey::parse(&caps[1]),
            title: title.to_string(),
            confidence: shaped(title, Confidence::High),
        });
    } else if let Some(caps) = CHAPTER_BARE_RE.captures(line) {
        let key = NumberKey::parse(&caps[1]);
        let title = caps[2].trim();
        // Bare numerals double as list items and wrapped prose; only a
        // short title-cased line that steps just past the open chapter counts.
        let open = ctx.chapter.as_ref().and_then(NumberKey::first);
        let advances = match (open, key.as_ref().and_then(NumberKey::first)) {
            (Some(open), Some(k)) => k > open && k - open <= MAX_BARE_CHAPTER_JUMP,
            _ => true,
        };
        let heading = title.split_whitespace().count() <= MAX_BARE_TITLE_WORDS
            && is_title_cased(title)
            && is_heading_title(title);
        out.push(Candidate {
            level: Level::Chapter,
            label: Some(caps[1].to_string()),
            key,
            title: title.to_string(),
            confidence: if advances && heading { Confidence::Medium } else { Confidence::Demoted },
        });
    }

    if let Some(caps) = DOTTED_RE.captures(line) {
        let title = caps[2].trim();
        if let Some(key) = NumberKey::parse(&caps[1]).filter(|_| !title.ends_with('.')) {
            let (level, consistent) = if key.depth() == 2 {
                let consistent = match &ctx.chapter {
                    Some(open) => key.parent().as_ref() == Some(open),
                    // No chapter, or a placeholder: the builder supplies the parent.
                    None => true,
                };
                (Level::Section, consistent)
            } else {
                let consistent = ctx.section.is_some() && key.parent() == ctx.section;
                (Level::Subsection, consistent)
            };
            out.push(Candidate {
                level,
                label: Some(key.to_string()),
                key: Some(key),
                title: title.to_string(),
                confidence: if consistent { shaped(title, Confidence::High) } else { Confidence::Demoted },
            });
        }
    }

    if is_caps_heading(line, settings.caps_heading_max_len) {
        out.push(Candidate {
            level: Level::Chapter,
            label: None,
            key: None,
            title: line.to_string(),
            confidence: Confidence::Fallback,
        });
    }

    out.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| b.level.depth().cmp(&a.level.depth()))
    });
    out
}

/// Short line whose letters are all upper-case, e.g. `TREATMENT`.
pub fn is_caps_heading(line: &str, max_len: usize) -> bool {
    let line = line.trim();
    if line.is_empty() || line.chars().count() > max_len || line.ends_with('.') {
        return false;
    }
    if !line.chars().next().is_some_and(|c| c.is_alphabetic()) {
        return false;
    }
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase()) && !DOSE_TOKEN_RE.is_match(line)
}

/// Whether `title` reads as a heading title rather than running prose.
///
/// An empty title passes (the title may follow on the next line). Otherwise
/// it must start upper-case, stay short, carry no dose or unit tokens, and
/// not end in sentence punctuation or a dangling connective.
pub fn is_heading_title(title: &str) -> bool {
    let title = title.trim();
    if title.is_empty() {
        return true;
    }
    if !title.chars().next().is_some_and(char::is_uppercase) {
        return false;
    }
    if title.ends_with(['.', ',', ';']) || DOSE_TOKEN_RE.is_match(title) {
        return false;
    }
    let words: Vec<&str> = title.split_whitespace().collect();
    words.len() <= MAX_TITLE_WORDS
        && words
            .last()
            .is_some_and(|w| !CONNECTIVES.contains(&w.to_lowercase().as_str()))
}

/// Every lower-case word is a connective: `Otitis Media and Otitis Externa`.
fn is_title_cased(title: &str) -> bool {
    title.split_whitespace().all(|w| {
        !w.chars().next().is_some_and(char::is_lowercase) || CONNECTIVES.contains(&w)
    })
}

fn shaped(title: &str, confidence: Confidence) -> Confidence {
    if is_heading_title(title) {
        confidence
    } else {
        Confidence::Demoted
    }
}

fn ordinal_key(ordinal: u32) -> Option<NumberKey> {
    NumberKey::parse(&ordinal.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(line: &str, ctx: &PathContext) -> Vec<Candidate> {
        classify_line(line, ctx, &ExtractSettings::default())
    }

    fn in_chapter(n: &str) -> PathContext {
        PathContext {
            chapter: NumberKey::parse(n),
            ..Default::default()
        }
    }

    #[test]
    fn section_under_matching_chapter() {
        let c = classify("14.3 Acute Otitis Media", &in_chapter("14"));
        assert_eq!(c[0].level, Level::Section);
        assert_eq!(c[0].label.as_deref(), Some("14.3"));
        assert_eq!(c[0].title, "Acute Otitis Media");
        assert_eq!(c[0].confidence, Confidence::High);
    }

    #[test]
    fn section_under_wrong_chapter_is_demoted() {
        let c = classify("5.2 Clinical Course", &in_chapter("4"));
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].confidence, Confidence::Demoted);
    }

    #[test]
    fn section_without_chapter_is_accepted() {
        let c = classify("5.2 Clinical Course", &PathContext::default());
        assert_eq!(c[0].level, Level::Section);
        assert_eq!(c[0].confidence, Confidence::High);
    }

    #[test]
    fn subsection_needs_its_section() {
        let mut ctx = in_chapter("14");
        ctx.section = NumberKey::parse("14.3");
        let c = classify("14.3.1 Diagnosis", &ctx);
        assert_eq!(c[0].level, Level::Subsection);
        assert_eq!(c[0].confidence, Confidence::High);

        let c = classify("14.4.1 Diagnosis", &ctx);
        assert_eq!(c[0].confidence, Confidence::Demoted);
        let c = classify("14.3.1 Diagnosis", &in_chapter("14"));
        assert_eq!(c[0].confidence, Confidence::Demoted);
    }

    #[test]
    fn chapter_label_beats_caps_fallback() {
        let c = classify("CHAPTER 14 OTITIS MEDIA", &PathContext::default());
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].level, Level::Chapter);
        assert_eq!(c[0].confidence, Confidence::High);
        assert_eq!(c[0].title, "OTITIS MEDIA");
        assert_eq!(c[1].confidence, Confidence::Fallback);
    }

    #[test]
    fn chapter_without_title() {
        let c = classify("Chapter 22", &PathContext::default());
        assert_eq!(c[0].key, NumberKey::parse("22"));
        assert!(c[0].title.is_empty());
    }

    #[test]
    fn bare_numeral_chapter_must_advance() {
        let c = classify("15 Croup", &in_chapter("14"));
        assert_eq!(c[0].level, Level::Chapter);
        assert_eq!(c[0].confidence, Confidence::Medium);

        let c = classify("2 Give Fluids", &in_chapter("14"));
        assert_eq!(c[0].confidence, Confidence::Demoted);
    }

    #[test]
    fn parts_and_volumes() {
        let c = classify("PART XII Infectious Diseases", &PathContext::default());
        assert_eq!(c[0].level, Level::Part);
        assert_eq!(c[0].key, NumberKey::parse("12"));
        assert_eq!(c[0].label.as_deref(), Some("XII"));

        let c = classify("XII. INFECTIOUS DISEASES", &PathContext::default());
        assert_eq!(c[0].level, Level::Part);
        assert_eq!(c[0].confidence, Confidence::Medium);

        let ctx = PathContext {
            part: Some(12),
            ..Default::default()
        };
        let c = classify("V. Cardiovascular Disease", &ctx);
        assert_eq!(c[0].confidence, Confidence::Demoted);

        let c = classify("Volume 2: Clinical Disorders", &PathContext::default());
        assert_eq!(c[0].level, Level::Volume);
        assert_eq!(c[0].title, "Clinical Disorders");
    }

    #[test]
    fn body_text_has_no_candidates() {
        let ctx = in_chapter("14");
        assert!(classify("Amoxicillin is the first-line agent.", &ctx).is_empty());
        assert!(classify("2.5 mg/kg is given twice daily", &ctx).is_empty());
        assert!(classify("14.3 Acute otitis media is the most common diagnosis.", &ctx).is_empty());
        assert!(classify("", &ctx).is_empty());
    }

    #[test]
    fn labelled_prose_is_demoted() {
        let ctx = in_chapter("14");
        let c = classify("Volume 20 mL/kg of saline is infused", &ctx);
        assert_eq!(c[0].level, Level::Volume);
        assert_eq!(c[0].confidence, Confidence::Demoted);

        let c = classify("Chapter 3 of the guideline covers dosing.", &ctx);
        assert!(c.iter().all(|c| c.confidence == Confidence::Demoted));

        let c = classify("Part I of the trial enrolled infants", &ctx);
        assert_eq!(c[0].confidence, Confidence::Demoted);
    }

    #[test]
    fn roman_parts_are_upper_case_only() {
        assert!(classify("Part civil law applies", &PathContext::default()).is_empty());
        let c = classify("Part xii Infectious Diseases", &PathContext::default());
        assert!(c.is_empty());
        let c = classify("Part XII Infectious Diseases", &PathContext::default());
        assert_eq!(c[0].confidence, Confidence::High);
        assert_eq!(c[0].label.as_deref(), Some("XII"));
    }

    #[test]
    fn bare_numeral_prose_is_demoted() {
        let ctx = in_chapter("14");
        let c = classify("120 Children were treated with amoxicillin and", &ctx);
        assert_eq!(c[0].level, Level::Chapter);
        assert_eq!(c[0].confidence, Confidence::Demoted);

        // Title-cased, but too far past the open chapter.
        let c = classify("120 Croup", &ctx);
        assert_eq!(c[0].confidence, Confidence::Demoted);

        let c = classify("16 Otitis Media and Otitis Externa", &ctx);
        assert_eq!(c[0].confidence, Confidence::Medium);

        let c = classify("30 Patients Received Oral Rehydration Then Returned Home Within Two Days", &PathContext::default());
        assert_eq!(c[0].confidence, Confidence::Demoted);
    }

    #[test]
    fn heading_title_shape() {
        assert!(is_heading_title(""));
        assert!(is_heading_title("Cystic Fibrosis"));
        assert!(is_heading_title("OTITIS MEDIA AND OTITIS EXTERNA"));
        assert!(!is_heading_title("mL/kg of saline is infused"));
        assert!(!is_heading_title("Amoxicillin 40 mg/kg/day PO q8h is first-line."));
        assert!(!is_heading_title("Give 20 mL/kg"));
        assert!(!is_heading_title("Children treated with"));
        assert!(!is_heading_title("In one cohort,"));
    }

    #[test]
    fn caps_heading_rules() {
        assert!(is_caps_heading("TREATMENT", 60));
        assert!(is_caps_heading("CLINICAL MANIFESTATIONS", 60));
        assert!(!is_caps_heading("IV", 60));
        assert!(!is_caps_heading("Treatment", 60));
        assert!(!is_caps_heading("SEE TABLE 14.2.", 60));
        assert!(!is_caps_heading(&"A".repeat(61), 60));
        assert!(!is_caps_heading("GIVE 20 ML/KG BOLUS", 60));
    }
}
