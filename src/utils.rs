use std::cmp::Ordering;
use std::fmt;

use itertools::Itertools;

/// Dotted heading number (`"14"`, `"3.2"`, `"14.10.1"`) as a comparable key.
///
/// Components compare numerically, so `"3.02"` equals `"3.2"` and `"14.10"`
/// sorts after `"14.9"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NumberKey(Vec<u32>);

impl NumberKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().trim_end_matches('.');
        if raw.is_empty() {
            return None;
        }
        raw.split('.')
            .map(|part| part.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()
            .map(NumberKey)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Key of the enclosing level: `14.3.1` → `14.3`.
    pub fn parent(&self) -> Option<NumberKey> {
        if self.0.len() < 2 {
            return None;
        }
        Some(NumberKey(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn first(&self) -> Option<u32> {
        self.0.first().copied()
    }
}

impl fmt::Display for NumberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join("."))
    }
}

/// Parse a roman numeral (`"XIV"`) or a plain integer (`"14"`).
pub fn parse_ordinal(raw: &str) -> Option<u32> {
    let raw = raw.trim().trim_end_matches('.');
    if let Ok(n) = raw.parse::<u32>() {
        return Some(n);
    }
    roman_to_u32(raw)
}

fn roman_to_u32(raw: &str) -> Option<u32> {
    if raw.is_empty() {
        return None;
    }
    let value = |c: char| match c.to_ascii_uppercase() {
        'I' => Some(1),
        'V' => Some(5),
        'X' => Some(10),
        'L' => Some(50),
        'C' => Some(100),
        'D' => Some(500),
        'M' => Some(1000),
        _ => None,
    };
    let digits: Vec<u32> = raw.chars().map(value).collect::<Option<_>>()?;
    let mut total = 0;
    for (i, d) in digits.iter().enumerate() {
        match digits.get(i + 1) {
            Some(next) if next > d => total -= *d as i64,
            _ => total += *d as i64,
        }
    }
    u32::try_from(total).ok().filter(|n| *n > 0)
}

/// Punctuation stripped, lower-cased, words sorted and space-joined.
pub fn search_tokens(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .sorted()
        .join(" ")
}

/// Lower-case and collapse inner whitespace.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().join(" ").to_lowercase()
}

/// "CLINICAL MANIFESTATIONS" → "Clinical Manifestations".
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .join(" ")
}

/// Compare file names so that embedded numbers sort numerically
/// (`part_2.txt` before `part_10.txt`).
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let na: String = ai.peeking_take_while(|c| c.is_ascii_digit()).collect();
                let nb: String = bi.peeking_take_while(|c| c.is_ascii_digit()).collect();
                let ord = na
                    .trim_start_matches('0')
                    .len()
                    .cmp(&nb.trim_start_matches('0').len())
                    .then_with(|| na.trim_start_matches('0').cmp(nb.trim_start_matches('0')))
                    .then_with(|| na.len().cmp(&nb.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                ai.next();
                bi.next();
            }
        }
    }
}
