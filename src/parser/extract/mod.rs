pub mod dictionary;
pub mod dosage;
pub mod drug_info;

use std::collections::{BTreeMap, HashMap};

#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use super::structure::Skeleton;
use super::ExtractSettings;
use crate::db::{
    ChapterRow, ContentBlockRow, DrugDosageRow, DrugRow, MedicalConditionRow, PartRow, SectionRow,
    SubsectionRow, VolumeRow,
};
use crate::utils::{normalize_name, search_tokens};
use dictionary::{DictMatch, Dictionaries};
use dosage::{DosageGrammar, DosageHit};
use drug_info::{drug_facts, DrugFacts};

/// Final output of one corpus run: one ordered table per entity kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityGraph {
    pub volumes: Vec<VolumeRow>,
    pub parts: Vec<PartRow>,
    pub chapters: Vec<ChapterRow>,
    pub sections: Vec<SectionRow>,
    pub subsections: Vec<SubsectionRow>,
    pub content_blocks: Vec<ContentBlockRow>,
    pub conditions: Vec<MedicalConditionRow>,
    pub drugs: Vec<DrugRow>,
    pub dosages: Vec<DrugDosageRow>,
}

impl EntityGraph {
    /// Row count per table name.
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        BTreeMap::from([
            ("volumes", self.volumes.len()),
            ("parts", self.parts.len()),
            ("chapters", self.chapters.len()),
            ("sections", self.sections.len()),
            ("subsections", self.subsections.len()),
            ("content_blocks", self.content_blocks.len()),
            ("medical_conditions", self.conditions.len()),
            ("drugs", self.drugs.len()),
            ("drug_dosages", self.dosages.len()),
        ])
    }
}

/// What one block contains, before any id is assigned.
struct BlockScan {
    section_id: i64,
    conditions: Vec<DictMatch>,
    drugs: Vec<DictMatch>,
    /// One entry per drug match.
    facts: Vec<DrugFacts>,
    dosages: Vec<(usize, DosageHit)>,
}

fn scan_block(
    dicts: &Dictionaries,
    grammar: &DosageGrammar,
    settings: &ExtractSettings,
    block: &ContentBlockRow,
) -> BlockScan {
    let drugs = dicts.drugs.find(&block.text);
    let dosages = grammar.extract(&block.text, &drugs, settings);
    let facts = drugs.iter().map(|m| drug_facts(&block.text, m)).collect();
    BlockScan {
        // Always the section, even when the block sits in a subsection.
        section_id: block.section_id,
        conditions: dicts.conditions.find(&block.text),
        drugs,
        facts,
        dosages,
    }
}

/// Owns the dedupe tables for one run and hands out ids in first-seen order.
pub struct Assembler<'a> {
    dicts: &'a Dictionaries,
    grammar: &'a DosageGrammar,
    settings: &'a ExtractSettings,
    conditions: Vec<MedicalConditionRow>,
    condition_index: HashMap<(i64, String), usize>,
    drugs: Vec<DrugRow>,
    drug_index: HashMap<String, i64>,
    dosages: Vec<DrugDosageRow>,
}

impl<'a> Assembler<'a> {
    pub fn new(dicts: &'a Dictionaries, grammar: &'a DosageGrammar, settings: &'a ExtractSettings) -> Self {
        Assembler {
            dicts,
            grammar,
            settings,
            conditions: Vec::new(),
            condition_index: HashMap::new(),
            drugs: Vec::new(),
            drug_index: HashMap::new(),
            dosages: Vec::new(),
        }
    }

    /// Scan blocks for conditions, drugs and dosages and record them.
    ///
    /// Scanning is independent per block; results are applied in block order.
    pub fn scan_blocks(&mut self, blocks: &[ContentBlockRow]) {
        let (dicts, grammar, settings) = (self.dicts, self.grammar, self.settings);

        #[cfg(feature = "rayon")]
        let scans: Vec<BlockScan> = blocks
            .par_iter()
            .map(|b| scan_block(dicts, grammar, settings, b))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let scans: Vec<BlockScan> = blocks
            .iter()
            .map(|b| scan_block(dicts, grammar, settings, b))
            .collect();

        for scan in scans {
            self.apply(scan);
        }
    }

    fn apply(&mut self, scan: BlockScan) {
        for m in &scan.conditions {
            self.record_condition(scan.section_id, m, false);
        }
        let drug_ids: Vec<i64> = scan.drugs.iter().map(|m| self.drug_id(&m.canonical)).collect();
        for (&id, facts) in drug_ids.iter().zip(scan.facts) {
            self.merge_facts(id, facts);
        }
        for (idx, hit) in scan.dosages {
            let id = self.dosages.len() as i64 + 1;
            self.dosages.push(DrugDosageRow {
                id,
                drug_id: drug_ids[idx],
                section_id: scan.section_id,
                age_group: hit.age_group,
                route: hit.route,
                value: hit.value,
                max: hit.max,
                frequency: hit.frequency,
                special_considerations: hit.special_considerations,
                pattern: hit.pattern,
            });
        }
    }

    fn record_condition(&mut self, section_id: i64, m: &DictMatch, from_title: bool) {
        let key = (section_id, m.canonical.clone());
        if let Some(&idx) = self.condition_index.get(&key) {
            let row = &mut self.conditions[idx];
            if from_title {
                row.title_derived = true;
            } else {
                row.mentions += 1;
            }
            return;
        }
        let id = self.conditions.len() as i64 + 1;
        self.conditions.push(MedicalConditionRow {
            id,
            section_id,
            name: m.surface.split_whitespace().collect::<Vec<_>>().join(" "),
            canonical_name: m.canonical.clone(),
            mentions: 1,
            title_derived: from_title,
            tokens: search_tokens(&m.canonical),
        });
        self.condition_index.insert(key, self.conditions.len() - 1);
    }

    fn drug_id(&mut self, canonical: &str) -> i64 {
        if let Some(&id) = self.drug_index.get(canonical) {
            return id;
        }
        let id = self.drugs.len() as i64 + 1;
        let aliases = self
            .dicts
            .drugs
            .aliases(canonical)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        self.drugs.push(DrugRow {
            id,
            canonical_name: canonical.to_string(),
            aliases,
            formulations: None,
            indication: None,
            adverse_effects: None,
            tokens: String::new(),
        });
        self.drug_index.insert(canonical.to_string(), id);
        id
    }

    /// First reported value wins for each fact; brands join the aliases.
    fn merge_facts(&mut self, drug_id: i64, facts: DrugFacts) {
        if facts.is_empty() {
            return;
        }
        let row = &mut self.drugs[(drug_id - 1) as usize];
        if let Some(brand) = facts.brand.map(|b| normalize_name(&b)) {
            if brand != row.canonical_name && !row.aliases.contains(&brand) {
                debug!(drug = %row.canonical_name, brand = %brand, "Brand alias captured");
                row.aliases.push(brand);
                row.aliases.sort();
            }
        }
        row.formulations = row.formulations.take().or(facts.formulations);
        row.indication = row.indication.take().or(facts.indication);
        row.adverse_effects = row.adverse_effects.take().or(facts.adverse_effects);
    }

    /// Conditions named in chapter titles, anchored to each chapter's first section.
    pub fn add_title_conditions(&mut self, skeleton: &Skeleton) {
        for chapter in &skeleton.chapters {
            let Some(section_id) = skeleton.first_section_of(chapter.id) else {
                debug!(chapter = chapter.id, "Chapter has no section; title conditions skipped");
                continue;
            };
            for m in self.dicts.conditions.find(&chapter.title) {
                self.record_condition(section_id, &m, true);
            }
        }
    }

    pub fn finish(mut self, skeleton: Skeleton) -> EntityGraph {
        for drug in &mut self.drugs {
            let names = std::iter::once(&drug.canonical_name).chain(&drug.aliases);
            drug.tokens = search_tokens(&names.map(String::as_str).collect::<Vec<_>>().join(" "));
        }
        EntityGraph {
            volumes: skeleton.volumes,
            parts: skeleton.parts,
            chapters: skeleton.chapters,
            sections: skeleton.sections,
            subsections: skeleton.subsections,
            content_blocks: skeleton.blocks,
            conditions: self.conditions,
            drugs: self.drugs,
            dosages: self.dosages,
        }
    }
}
