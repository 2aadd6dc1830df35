pub mod extract;
pub mod lines;
pub mod structure;

use tracing::info;

use crate::corpus::{self, Document};
use crate::error::CorpusError;
use extract::dictionary::Dictionaries;
use extract::dosage::DosageGrammar;
use extract::{Assembler, EntityGraph};
use structure::{HierarchyPath, StructureBuilder};

/// Tunables for classification and extraction.
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    /// Characters scanned before a drug mention for its dosage.
    pub window_before: usize,
    /// Characters scanned after a drug mention for its dosage.
    pub window_after: usize,
    pub caps_heading_max_len: usize,
    pub max_heading_len: usize,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        ExtractSettings {
            window_before: 200,
            window_after: 200,
            caps_heading_max_len: 60,
            max_heading_len: 120,
        }
    }
}

/// Whole-corpus pipeline: per file, lines → skeleton → blocks → entities.
///
/// Files are processed strictly in the given order; the hierarchy path left
/// open by one file seeds the next.
pub fn process_corpus(
    docs: &[Document],
    dicts: &Dictionaries,
    settings: &ExtractSettings,
) -> Result<EntityGraph, CorpusError> {
    process_corpus_with(docs, dicts, settings, |_| {})
}

/// Same as [`process_corpus`], calling `on_file` after each document.
pub fn process_corpus_with(
    docs: &[Document],
    dicts: &Dictionaries,
    settings: &ExtractSettings,
    mut on_file: impl FnMut(&Document),
) -> Result<EntityGraph, CorpusError> {
    corpus::ensure_not_empty(docs)?;
    let grammar = DosageGrammar::standard()?;
    info!(
        grammar = grammar.version(),
        patterns = grammar.patterns().len(),
        "Dosage grammar ready"
    );

    let mut builder = StructureBuilder::new(settings);
    let mut assembler = Assembler::new(dicts, &grammar, settings);
    let mut path = HierarchyPath::default();

    for doc in docs {
        let outcome = builder.process_file(doc, path);
        assembler.scan_blocks(&builder.skeleton().blocks[outcome.blocks.clone()]);
        path = outcome.path;
        on_file(doc);
    }

    let skeleton = builder.finish();
    assembler.add_title_conditions(&skeleton);
    let graph = assembler.finish(skeleton);
    info!(
        documents = docs.len(),
        chapters = graph.chapters.len(),
        sections = graph.sections.len(),
        conditions = graph.conditions.len(),
        drugs = graph.drugs.len(),
        dosages = graph.dosages.len(),
        "Corpus processed"
    );
    Ok(graph)
}
