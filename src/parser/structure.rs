use std::collections::HashMap;
use std::ops::Range;

use tracing::{debug, info};

use super::lines::{classify_line, is_heading_title, Candidate, Confidence, Level, PathContext};
use super::ExtractSettings;
use crate::corpus::Document;
use crate::db::{ChapterRow, ContentBlockRow, PartRow, SectionRow, SubsectionRow, VolumeRow};
use crate::utils::{search_tokens, title_case, NumberKey};

pub const UNCLASSIFIED: &str = "Unclassified";
pub const GENERAL_SECTION: &str = "General";

/// One open level of the hierarchy: entity id plus its numeric key, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub id: i64,
    pub key: Option<NumberKey>,
}

/// The currently open path. Returned at the end of each file and passed
/// into the next one, so a section can continue across a file boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchyPath {
    pub volume: Option<Slot>,
    pub part: Option<Slot>,
    pub chapter: Option<Slot>,
    pub section: Option<Slot>,
    pub subsection: Option<Slot>,
}

impl HierarchyPath {
    pub fn context(&self) -> PathContext {
        PathContext {
            part: self.part.as_ref().and_then(|s| s.key.as_ref()).and_then(|k| k.first()),
            chapter: self.chapter.as_ref().and_then(|s| s.key.clone()),
            section: self.section.as_ref().and_then(|s| s.key.clone()),
        }
    }

    /// Close every slot deeper than `level`.
    fn truncate_below(&mut self, level: Level) {
        if level < Level::Part {
            self.part = None;
        }
        if level < Level::Chapter {
            self.chapter = None;
        }
        if level < Level::Section {
            self.section = None;
        }
        if level < Level::Subsection {
            self.subsection = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ChapterKey {
    Number(NumberKey),
    Title(String),
}

/// Structural entities of the whole corpus plus the lookup tables used to
/// locate an existing entity instead of creating a duplicate.
#[derive(Debug, Default)]
pub struct Skeleton {
    pub volumes: Vec<VolumeRow>,
    pub parts: Vec<PartRow>,
    pub chapters: Vec<ChapterRow>,
    pub sections: Vec<SectionRow>,
    pub subsections: Vec<SubsectionRow>,
    pub blocks: Vec<ContentBlockRow>,
    volume_index: HashMap<u32, i64>,
    part_index: HashMap<(i64, u32), i64>,
    chapter_index: HashMap<(Option<i64>, ChapterKey), i64>,
    section_index: HashMap<(i64, Option<NumberKey>), i64>,
    subsection_index: HashMap<(i64, NumberKey), i64>,
    next_sequence: HashMap<i64, u32>,
}

impl Skeleton {
    /// First section created under a chapter.
    pub fn first_section_of(&self, chapter_id: i64) -> Option<i64> {
        self.sections
            .iter()
            .find(|s| s.chapter_id == chapter_id)
            .map(|s| s.id)
    }

    /// Running text of a section: its blocks joined in sequence order.
    #[cfg(test)]
    pub fn section_text(&self, section_id: i64) -> String {
        let mut blocks: Vec<&ContentBlockRow> =
            self.blocks.iter().filter(|b| b.section_id == section_id).collect();
        blocks.sort_by_key(|b| b.sequence_index);
        blocks.iter().map(|b| b.text.as_str()).collect()
    }

    #[cfg(test)]
    pub fn section_by_number(&self, number: &str) -> Option<&SectionRow> {
        self.sections.iter().find(|s| s.number == number)
    }

    fn volume(&mut self, ordinal: u32, title: &str) -> i64 {
        if let Some(&id) = self.volume_index.get(&ordinal) {
            fill_title(&mut self.volumes[(id - 1) as usize].title, title);
            return id;
        }
        let id = self.volumes.len() as i64 + 1;
        self.volumes.push(VolumeRow {
            id,
            ordinal,
            title: title.to_string(),
        });
        self.volume_index.insert(ordinal, id);
        id
    }

    fn part(&mut self, volume_id: i64, ordinal: u32, label: &str, title: &str) -> i64 {
        if let Some(&id) = self.part_index.get(&(volume_id, ordinal)) {
            fill_title(&mut self.parts[(id - 1) as usize].title, title);
            return id;
        }
        let id = self.parts.len() as i64 + 1;
        self.parts.push(PartRow {
            id,
            volume_id,
            ordinal,
            label: label.to_string(),
            title: title.to_string(),
        });
        self.part_index.insert((volume_id, ordinal), id);
        id
    }

    fn chapter(&mut self, part_id: Option<i64>, key: Option<&NumberKey>, title: &str) -> i64 {
        let lookup = match key {
            Some(k) => ChapterKey::Number(k.clone()),
            None => ChapterKey::Title(title.to_uppercase()),
        };
        if let Some(&id) = self.chapter_index.get(&(part_id, lookup.clone())) {
            let row = &mut self.chapters[(id - 1) as usize];
            if fill_title(&mut row.title, title) {
                row.title_tokens = search_tokens(title);
            }
            return id;
        }
        let id = self.chapters.len() as i64 + 1;
        self.chapters.push(ChapterRow {
            id,
            part_id,
            number: key.map(|k| k.to_string()).unwrap_or_default(),
            title: title.to_string(),
            title_tokens: search_tokens(title),
        });
        self.chapter_index.insert((part_id, lookup), id);
        id
    }

    fn section(&mut self, chapter_id: i64, key: Option<&NumberKey>, title: &str) -> i64 {
        let lookup = (chapter_id, key.cloned());
        if let Some(&id) = self.section_index.get(&lookup) {
            let row = &mut self.sections[(id - 1) as usize];
            if fill_title(&mut row.title, title) {
                row.title_tokens = search_tokens(title);
            }
            return id;
        }
        let id = self.sections.len() as i64 + 1;
        self.sections.push(SectionRow {
            id,
            chapter_id,
            number: key.map(|k| k.to_string()).unwrap_or_default(),
            title: title.to_string(),
            title_tokens: search_tokens(title),
        });
        self.section_index.insert(lookup, id);
        id
    }

    fn subsection(&mut self, section_id: i64, key: &NumberKey, title: &str) -> i64 {
        let lookup = (section_id, key.clone());
        if let Some(&id) = self.subsection_index.get(&lookup) {
            let row = &mut self.subsections[(id - 1) as usize];
            if fill_title(&mut row.title, title) {
                row.title_tokens = search_tokens(title);
            }
            return id;
        }
        let id = self.subsections.len() as i64 + 1;
        self.subsections.push(SubsectionRow {
            id,
            section_id,
            number: key.to_string(),
            title: title.to_string(),
            title_tokens: search_tokens(title),
        });
        self.subsection_index.insert(lookup, id);
        id
    }

    fn set_title(&mut self, level: Level, id: i64, title: &str) {
        let idx = (id - 1) as usize;
        match level {
            Level::Volume => self.volumes[idx].title = title.to_string(),
            Level::Part => self.parts[idx].title = title.to_string(),
            Level::Chapter => {
                self.chapters[idx].title = title.to_string();
                self.chapters[idx].title_tokens = search_tokens(title);
            }
            Level::Section => {
                self.sections[idx].title = title.to_string();
                self.sections[idx].title_tokens = search_tokens(title);
            }
            Level::Subsection => {
                self.subsections[idx].title = title.to_string();
                self.subsections[idx].title_tokens = search_tokens(title);
            }
        }
    }

    fn push_block(&mut self, block: OpenBlock, source: &str) {
        if block.text.is_empty() {
            return;
        }
        let seq = self.next_sequence.entry(block.section_id).or_insert(0);
        let sequence_index = *seq;
        *seq += 1;
        self.blocks.push(ContentBlockRow {
            id: self.blocks.len() as i64 + 1,
            section_id: block.section_id,
            subsection_id: block.subsection_id,
            sequence_index,
            topic: block.topic,
            source: source.to_string(),
            tokens: search_tokens(&block.text),
            text: block.text,
        });
    }
}

/// Returns true when the stored title was empty and has been filled.
fn fill_title(stored: &mut String, title: &str) -> bool {
    if stored.is_empty() && !title.is_empty() {
        *stored = title.to_string();
        return true;
    }
    false
}

#[derive(Debug)]
struct OpenBlock {
    section_id: i64,
    subsection_id: Option<i64>,
    topic: Option<String>,
    text: String,
}

/// What one file contributed.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    /// Indices into `Skeleton::blocks` of the blocks this file emitted.
    pub blocks: Range<usize>,
    /// Path still open at end of file; seed for the next file.
    pub path: HierarchyPath,
}

pub struct StructureBuilder<'a> {
    settings: &'a ExtractSettings,
    skeleton: Skeleton,
}

impl<'a> StructureBuilder<'a> {
    pub fn new(settings: &'a ExtractSettings) -> Self {
        StructureBuilder {
            settings,
            skeleton: Skeleton::default(),
        }
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn finish(self) -> Skeleton {
        self.skeleton
    }

    /// Walk one file line by line, starting from the path the previous file left open.
    pub fn process_file(&mut self, doc: &Document, seed: HierarchyPath) -> FileOutcome {
        let first_block = self.skeleton.blocks.len();
        let mut path = seed;
        let mut open: Option<OpenBlock> = None;
        let mut pending_title: Option<(Level, i64)> = None;
        let mut demoted = 0usize;

        for line in doc.text.split_inclusive('\n') {
            let trimmed = line.trim();

            if let Some((level, id)) = pending_title {
                if trimmed.is_empty() {
                    continue;
                }
                pending_title = None;
                let candidates = classify_line(trimmed, &path.context(), self.settings);
                // Prose after a bare label stays content.
                if is_heading_title(trimmed)
                    && !candidates.iter().any(|c| c.confidence >= Confidence::Medium)
                {
                    self.skeleton.set_title(level, id, trimmed);
                    continue;
                }
            }

            let candidates = classify_line(trimmed, &path.context(), self.settings);
            let accepted = candidates
                .iter()
                .find(|c| c.confidence > Confidence::Demoted)
                .cloned();

            match accepted {
                Some(c) if c.confidence == Confidence::Fallback => {
                    if let Some(b) = open.take() {
                        self.skeleton.push_block(b, &doc.name);
                    }
                    if path.chapter.is_none() {
                        let part_id = path.part.as_ref().map(|s| s.id);
                        let id = self.skeleton.chapter(part_id, None, &c.title);
                        debug!(chapter = id, title = %c.title, "Caps line opened chapter");
                        path.chapter = Some(Slot { id, key: None });
                        path.truncate_below(Level::Chapter);
                    } else {
                        let (section_id, subsection_id) = self.ensure_section(&mut path);
                        open = Some(OpenBlock {
                            section_id,
                            subsection_id,
                            topic: Some(title_case(trimmed)),
                            text: line.to_string(),
                        });
                    }
                }
                Some(c) => {
                    if let Some(b) = open.take() {
                        self.skeleton.push_block(b, &doc.name);
                    }
                    let (level, id) = self.open_heading(&c, &mut path);
                    if level == Level::Subsection {
                        // The heading line stays in the parent section's running text.
                        open = Some(OpenBlock {
                            section_id: path.section.as_ref().map_or(0, |s| s.id),
                            subsection_id: Some(id),
                            topic: None,
                            text: line.to_string(),
                        });
                    } else if c.title.is_empty() {
                        pending_title = Some((level, id));
                    }
                }
                None => {
                    if candidates.first().is_some_and(|c| c.confidence == Confidence::Demoted) {
                        demoted += 1;
                        debug!(line = trimmed, "Heading-like line demoted to body text");
                    }
                    if open.is_none() {
                        if trimmed.is_empty() && path.section.is_none() {
                            continue;
                        }
                        let (section_id, subsection_id) = self.ensure_section(&mut path);
                        open = Some(OpenBlock {
                            section_id,
                            subsection_id,
                            topic: None,
                            text: String::new(),
                        });
                    }
                    if let Some(b) = open.as_mut() {
                        b.text.push_str(line);
                    }
                }
            }
        }

        if let Some(b) = open.take() {
            self.skeleton.push_block(b, &doc.name);
        }

        let blocks = first_block..self.skeleton.blocks.len();
        info!(
            file = %doc.name,
            blocks = blocks.len(),
            demoted,
            "Structured file"
        );
        FileOutcome { blocks, path }
    }

    fn open_heading(&mut self, c: &Candidate, path: &mut HierarchyPath) -> (Level, i64) {
        let key = c.key.clone();
        let id = match c.level {
            Level::Volume => {
                let ordinal = key.as_ref().and_then(|k| k.first()).unwrap_or(0);
                let id = self.skeleton.volume(ordinal, &c.title);
                path.volume = Some(Slot { id, key });
                id
            }
            Level::Part => {
                let volume_id = self.ensure_volume(path);
                let ordinal = key.as_ref().and_then(|k| k.first()).unwrap_or(0);
                let label = c.label.clone().unwrap_or_default();
                let id = self.skeleton.part(volume_id, ordinal, &label, &c.title);
                path.part = Some(Slot { id, key });
                id
            }
            Level::Chapter => {
                let part_id = path.part.as_ref().map(|s| s.id);
                let id = self.skeleton.chapter(part_id, key.as_ref(), &c.title);
                path.chapter = Some(Slot { id, key });
                id
            }
            Level::Section => {
                let chapter_id = self.ensure_chapter(path);
                let id = self.skeleton.section(chapter_id, key.as_ref(), &c.title);
                path.section = Some(Slot { id, key });
                id
            }
            Level::Subsection => {
                let (section_id, _) = self.ensure_section(path);
                let Some(k) = key.as_ref() else {
                    return (Level::Section, section_id);
                };
                let id = self.skeleton.subsection(section_id, k, &c.title);
                path.subsection = Some(Slot { id, key });
                id
            }
        };
        path.truncate_below(c.level);
        (c.level, id)
    }

    fn ensure_volume(&mut self, path: &mut HierarchyPath) -> i64 {
        if let Some(v) = &path.volume {
            return v.id;
        }
        let id = self.skeleton.volume(0, UNCLASSIFIED);
        debug!(volume = id, "Placeholder volume for part without volume");
        path.volume = Some(Slot { id, key: None });
        id
    }

    fn ensure_chapter(&mut self, path: &mut HierarchyPath) -> i64 {
        if let Some(c) = &path.chapter {
            return c.id;
        }
        let part_id = path.part.as_ref().map(|s| s.id);
        let id = self.skeleton.chapter(part_id, None, UNCLASSIFIED);
        debug!(chapter = id, "Placeholder chapter for orphan content");
        path.chapter = Some(Slot { id, key: None });
        path.truncate_below(Level::Chapter);
        id
    }

    fn ensure_section(&mut self, path: &mut HierarchyPath) -> (i64, Option<i64>) {
        if let Some(s) = &path.section {
            return (s.id, path.subsection.as_ref().map(|s| s.id));
        }
        let chapter_id = self.ensure_chapter(path);
        let title = self
            .skeleton
            .chapters
            .get((chapter_id - 1) as usize)
            .filter(|c| c.title == UNCLASSIFIED)
            .map_or(GENERAL_SECTION, |_| UNCLASSIFIED);
        let id = self.skeleton.section(chapter_id, None, title);
        path.section = Some(Slot { id, key: None });
        path.subsection = None;
        (id, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(files: &[(&str, &str)]) -> Skeleton {
        let settings = ExtractSettings::default();
        let mut builder = StructureBuilder::new(&settings);
        let mut path = HierarchyPath::default();
        for (name, text) in files {
            path = builder.process_file(&Document::new(*name, *text), path).path;
        }
        builder.finish()
    }

    #[test]
    fn section_under_chapter() {
        let sk = build(&[("a.txt", "CHAPTER 14 Otitis Media\n14.3 Acute Otitis Media\nBody text.\n")]);
        assert_eq!(sk.chapters.len(), 1);
        assert_eq!(sk.chapters[0].number, "14");
        let s = sk.section_by_number("14.3").unwrap();
        assert_eq!(s.chapter_id, sk.chapters[0].id);
        assert_eq!(s.title, "Acute Otitis Media");
        assert_eq!(s.title_tokens, "acute media otitis");
        assert_eq!(sk.blocks.len(), 1);
        assert_eq!(sk.blocks[0].text, "Body text.\n");
        assert_eq!(sk.blocks[0].tokens, "body text");
    }

    #[test]
    fn section_text_reconstructs_span() {
        let text = "CHAPTER 3 Fever\n3.1 Evaluation\nLine one.\n\nLine two.\nTREATMENT\nGive fluids.\n3.1.1 Imaging\nRarely needed.\n3.2 Management\nOther.\n";
        let sk = build(&[("a.txt", text)]);
        let s31 = sk.section_by_number("3.1").unwrap();
        assert_eq!(
            sk.section_text(s31.id),
            "Line one.\n\nLine two.\nTREATMENT\nGive fluids.\n3.1.1 Imaging\nRarely needed.\n"
        );
        let s32 = sk.section_by_number("3.2").unwrap();
        assert_eq!(sk.section_text(s32.id), "Other.\n");

        let topic_block = sk.blocks.iter().find(|b| b.topic.is_some()).unwrap();
        assert_eq!(topic_block.topic.as_deref(), Some("Treatment"));
        let sub_block = sk.blocks.iter().find(|b| b.subsection_id.is_some()).unwrap();
        assert_eq!(sub_block.section_id, s31.id);
        assert_eq!(sk.subsections[0].number, "3.1.1");
    }

    #[test]
    fn continuation_across_files() {
        let sk = build(&[
            ("nelson_part_1.txt", "CHAPTER 7 Asthma\n7.1 Pathogenesis\nFirst half of the\n"),
            ("nelson_part_2.txt", "sentence continues here.\n7.2 Treatment\nMore.\n"),
        ]);
        assert_eq!(sk.chapters.len(), 1);
        let s71 = sk.section_by_number("7.1").unwrap();
        assert_eq!(sk.section_text(s71.id), "First half of the\nsentence continues here.\n");
        let blocks: Vec<_> = sk.blocks.iter().filter(|b| b.section_id == s71.id).collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].sequence_index, 0);
        assert_eq!(blocks[1].sequence_index, 1);
        assert_eq!(blocks[1].source, "nelson_part_2.txt");
        assert!(sk.section_by_number("7.2").is_some());
    }

    #[test]
    fn repeated_heading_locates_existing_entity() {
        let sk = build(&[
            ("a.txt", "CHAPTER 7 Asthma\n7.1 Pathogenesis\nOne.\n"),
            ("b.txt", "CHAPTER 7 Asthma\n7.1 Pathogenesis\nTwo.\n"),
        ]);
        assert_eq!(sk.chapters.len(), 1);
        assert_eq!(sk.sections.len(), 1);
        assert_eq!(sk.section_text(sk.sections[0].id), "One.\nTwo.\n");
    }

    #[test]
    fn orphan_content_gets_placeholder_chapter() {
        let sk = build(&[("a.txt", "\nSome prose before any heading.\n")]);
        assert_eq!(sk.chapters.len(), 1);
        assert_eq!(sk.chapters[0].title, UNCLASSIFIED);
        assert_eq!(sk.chapters[0].number, "");
        assert_eq!(sk.blocks.len(), 1);
        assert_eq!(sk.blocks[0].text, "Some prose before any heading.\n");
    }

    #[test]
    fn section_without_chapter_gets_placeholder() {
        let sk = build(&[("a.txt", "5.2 Clinical Course\nText.\n")]);
        assert_eq!(sk.chapters[0].title, UNCLASSIFIED);
        let s = sk.section_by_number("5.2").unwrap();
        assert_eq!(s.chapter_id, sk.chapters[0].id);
    }

    #[test]
    fn inconsistent_section_demoted_to_body() {
        let sk = build(&[("a.txt", "CHAPTER 4 Growth\n4.1 Charts\nText.\n5.2 Clinical Course\nMore.\n")]);
        assert!(sk.section_by_number("5.2").is_none());
        let s = sk.section_by_number("4.1").unwrap();
        assert_eq!(sk.section_text(s.id), "Text.\n5.2 Clinical Course\nMore.\n");
    }

    #[test]
    fn chapter_title_on_next_line() {
        let sk = build(&[("a.txt", "Chapter 22\n\nCystic Fibrosis\n22.1 Genetics\nText.\n")]);
        assert_eq!(sk.chapters[0].title, "Cystic Fibrosis");
        assert_eq!(sk.chapters[0].title_tokens, "cystic fibrosis");
        assert_eq!(sk.sections.len(), 1);
        assert_eq!(sk.blocks.len(), 1);
    }

    #[test]
    fn prose_volume_line_stays_in_section() {
        let text = "CHAPTER 14 Otitis Media\n14.3 Acute Otitis Media\nFor shock,\nVolume 20 mL/kg of saline is infused\nover 20 minutes.\n";
        let sk = build(&[("a.txt", text)]);
        assert!(sk.volumes.is_empty());
        assert_eq!(sk.chapters.len(), 1);
        let s = sk.section_by_number("14.3").unwrap();
        assert_eq!(
            sk.section_text(s.id),
            "For shock,\nVolume 20 mL/kg of saline is infused\nover 20 minutes.\n"
        );
    }

    #[test]
    fn wrapped_numeral_prose_does_not_open_chapter() {
        let text = "CHAPTER 14 Otitis Media\n14.3 Acute Otitis Media\nIn one cohort,\n120 Children were treated with amoxicillin and\nmost recovered.\n15 Croup\nText.\n";
        let sk = build(&[("a.txt", text)]);
        let numbers: Vec<(&str, &str)> = sk
            .chapters
            .iter()
            .map(|c| (c.number.as_str(), c.title.as_str()))
            .collect();
        assert_eq!(numbers, vec![("14", "Otitis Media"), ("15", "Croup")]);
        let s = sk.section_by_number("14.3").unwrap();
        assert_eq!(
            sk.section_text(s.id),
            "In one cohort,\n120 Children were treated with amoxicillin and\nmost recovered.\n"
        );
    }

    #[test]
    fn prose_after_bare_chapter_label_is_kept() {
        let text = "Chapter 22\nAmoxicillin 40 mg/kg/day PO q8h is the first-line therapy for most children with this infection.\n22.1 Genetics\nText.\n";
        let sk = build(&[("a.txt", text)]);
        assert_eq!(sk.chapters.len(), 1);
        assert!(sk.chapters[0].title.is_empty());
        let texts: Vec<&str> = sk.blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Amoxicillin 40 mg/kg/day PO q8h is the first-line therapy for most children with this infection.\n",
                "Text.\n",
            ]
        );
        assert!(sk.section_by_number("22.1").is_some());
    }

    #[test]
    fn parts_volumes_and_caps_chapter() {
        let sk = build(&[(
            "a.txt",
            "PART XII Infectious Diseases\nCROUP\nCroup is common.\nVOLUME 2 Clinical\nPART V Cardiology\n",
        )]);
        assert_eq!(sk.volumes.len(), 2);
        assert_eq!(sk.volumes[0].title, UNCLASSIFIED);
        assert_eq!(sk.parts.len(), 2);
        assert_eq!(sk.parts[0].ordinal, 12);
        assert_eq!(sk.parts[1].volume_id, sk.volumes[1].id);
        assert_eq!(sk.chapters[0].title, "CROUP");
        assert_eq!(sk.chapters[0].part_id, Some(sk.parts[0].id));
        assert_eq!(sk.blocks[0].text, "Croup is common.\n");
    }

    #[test]
    fn fixture_corpus_structure() {
        let names = ["nelson_part_1.txt", "nelson_part_2.txt", "nelson_part_10.txt"];
        let texts: Vec<String> = names
            .iter()
            .map(|n| std::fs::read_to_string(format!("tests/fixtures/corpus/{}", n)).unwrap())
            .collect();
        let files: Vec<(&str, &str)> =
            names.iter().zip(&texts).map(|(n, t)| (*n, t.as_str())).collect();
        let sk = build(&files);

        let chapter = sk.chapters.iter().find(|c| c.number == "14").unwrap();
        let s143 = sk.section_by_number("14.3").unwrap();
        assert_eq!(s143.chapter_id, chapter.id);
        // 14.3 begins in part_1 and finishes in part_2
        let sources: Vec<&str> = sk
            .blocks
            .iter()
            .filter(|b| b.section_id == s143.id)
            .map(|b| b.source.as_str())
            .collect();
        assert!(sources.contains(&"nelson_part_1.txt"));
        assert!(sources.contains(&"nelson_part_2.txt"));
        assert!(sk.section_text(s143.id).contains("continues on the next page"));
    }
}
