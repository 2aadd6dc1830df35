use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

use crate::parser::extract::EntityGraph;

pub const DEFAULT_DB_PATH: &str = "data/textbook.sqlite";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS volumes (
            id        INTEGER PRIMARY KEY,
            ordinal   INTEGER NOT NULL,
            title     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS parts (
            id        INTEGER PRIMARY KEY,
            volume_id INTEGER NOT NULL REFERENCES volumes(id),
            ordinal   INTEGER NOT NULL,
            label     TEXT NOT NULL,
            title     TEXT NOT NULL,
            UNIQUE(volume_id, ordinal)
        );

        CREATE TABLE IF NOT EXISTS chapters (
            id           INTEGER PRIMARY KEY,
            part_id      INTEGER REFERENCES parts(id),
            number       TEXT NOT NULL,
            title        TEXT NOT NULL,
            title_tokens TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_chapters_part ON chapters(part_id);

        CREATE TABLE IF NOT EXISTS sections (
            id           INTEGER PRIMARY KEY,
            chapter_id   INTEGER NOT NULL REFERENCES chapters(id),
            number       TEXT NOT NULL,
            title        TEXT NOT NULL,
            title_tokens TEXT NOT NULL,
            UNIQUE(chapter_id, number)
        );

        CREATE TABLE IF NOT EXISTS subsections (
            id           INTEGER PRIMARY KEY,
            section_id   INTEGER NOT NULL REFERENCES sections(id),
            number       TEXT NOT NULL,
            title        TEXT NOT NULL,
            title_tokens TEXT NOT NULL,
            UNIQUE(section_id, number)
        );

        CREATE TABLE IF NOT EXISTS content_blocks (
            id             INTEGER PRIMARY KEY,
            section_id     INTEGER NOT NULL REFERENCES sections(id),
            subsection_id  INTEGER REFERENCES subsections(id),
            sequence_index INTEGER NOT NULL,
            topic          TEXT,
            source         TEXT NOT NULL,
            text           TEXT NOT NULL,
            tokens         TEXT NOT NULL,
            UNIQUE(section_id, sequence_index)
        );
        CREATE INDEX IF NOT EXISTS idx_blocks_section ON content_blocks(section_id);

        CREATE TABLE IF NOT EXISTS medical_conditions (
            id             INTEGER PRIMARY KEY,
            section_id     INTEGER NOT NULL REFERENCES sections(id),
            name           TEXT NOT NULL,
            canonical_name TEXT NOT NULL,
            mentions       INTEGER NOT NULL,
            title_derived  BOOLEAN NOT NULL DEFAULT 0,
            tokens         TEXT NOT NULL,
            UNIQUE(section_id, canonical_name)
        );
        CREATE INDEX IF NOT EXISTS idx_conditions_name ON medical_conditions(canonical_name);

        CREATE TABLE IF NOT EXISTS drugs (
            id             INTEGER PRIMARY KEY,
            canonical_name  TEXT UNIQUE NOT NULL,
            aliases         TEXT NOT NULL,
            formulations    TEXT,
            indication      TEXT,
            adverse_effects TEXT,
            tokens          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS drug_dosages (
            id                     INTEGER PRIMARY KEY,
            drug_id                INTEGER NOT NULL REFERENCES drugs(id),
            section_id             INTEGER NOT NULL REFERENCES sections(id),
            age_group              TEXT,
            route                  TEXT,
            value                  TEXT NOT NULL,
            max                    TEXT,
            frequency              TEXT,
            special_considerations TEXT,
            pattern                TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_dosages_drug ON drug_dosages(drug_id);
        CREATE INDEX IF NOT EXISTS idx_dosages_section ON drug_dosages(section_id);

        CREATE TABLE IF NOT EXISTS runs (
            id          INTEGER PRIMARY KEY,
            started_at  TEXT NOT NULL,
            documents   INTEGER NOT NULL,
            grammar     TEXT NOT NULL,
            counts      TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

// ── Entity rows ──

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeRow {
    pub id: i64,
    pub ordinal: u32,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartRow {
    pub id: i64,
    pub volume_id: i64,
    pub ordinal: u32,
    pub label: String, // "XII" as printed
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterRow {
    pub id: i64,
    pub part_id: Option<i64>,
    pub number: String,
    pub title: String,
    pub title_tokens: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionRow {
    pub id: i64,
    pub chapter_id: i64,
    pub number: String,
    pub title: String,
    pub title_tokens: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsectionRow {
    pub id: i64,
    pub section_id: i64,
    pub number: String,
    pub title: String,
    pub title_tokens: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentBlockRow {
    pub id: i64,
    pub section_id: i64,
    pub subsection_id: Option<i64>,
    pub sequence_index: u32,
    pub topic: Option<String>,
    pub source: String,
    pub text: String,
    pub tokens: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicalConditionRow {
    pub id: i64,
    pub section_id: i64,
    pub name: String,
    pub canonical_name: String,
    pub mentions: u32,
    pub title_derived: bool,
    pub tokens: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrugRow {
    pub id: i64,
    pub canonical_name: String,
    /// Dictionary aliases plus bracketed brand names seen in the text.
    pub aliases: Vec<String>,
    pub formulations: Option<String>,
    pub indication: Option<String>,
    pub adverse_effects: Option<String>,
    pub tokens: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrugDosageRow {
    pub id: i64,
    pub drug_id: i64,
    pub section_id: i64,
    pub age_group: Option<String>,
    pub route: Option<String>,
    pub value: String,
    pub max: Option<String>,
    pub frequency: Option<String>,
    pub special_considerations: Option<String>,
    pub pattern: String,
}

// ── Saving ──

/// Replace all entity tables with the rows of one corpus run.
pub fn save_graph(conn: &Connection, graph: &EntityGraph, documents: usize) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "DELETE FROM drug_dosages; DELETE FROM drugs; DELETE FROM medical_conditions;
         DELETE FROM content_blocks; DELETE FROM subsections; DELETE FROM sections;
         DELETE FROM chapters; DELETE FROM parts; DELETE FROM volumes;",
    )?;
    {
        let mut stmt = tx.prepare("INSERT INTO volumes (id, ordinal, title) VALUES (?1, ?2, ?3)")?;
        for v in &graph.volumes {
            stmt.execute(rusqlite::params![v.id, v.ordinal, v.title])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO parts (id, volume_id, ordinal, label, title) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for p in &graph.parts {
            stmt.execute(rusqlite::params![p.id, p.volume_id, p.ordinal, p.label, p.title])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO chapters (id, part_id, number, title, title_tokens)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for c in &graph.chapters {
            stmt.execute(rusqlite::params![c.id, c.part_id, c.number, c.title, c.title_tokens])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO sections (id, chapter_id, number, title, title_tokens)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for s in &graph.sections {
            stmt.execute(rusqlite::params![s.id, s.chapter_id, s.number, s.title, s.title_tokens])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO subsections (id, section_id, number, title, title_tokens)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for s in &graph.subsections {
            stmt.execute(rusqlite::params![s.id, s.section_id, s.number, s.title, s.title_tokens])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO content_blocks
             (id, section_id, subsection_id, sequence_index, topic, source, text, tokens)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for b in &graph.content_blocks {
            stmt.execute(rusqlite::params![
                b.id, b.section_id, b.subsection_id, b.sequence_index, b.topic, b.source, b.text,
                b.tokens,
            ])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO medical_conditions
             (id, section_id, name, canonical_name, mentions, title_derived, tokens)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for c in &graph.conditions {
            stmt.execute(rusqlite::params![
                c.id, c.section_id, c.name, c.canonical_name, c.mentions, c.title_derived, c.tokens,
            ])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO drugs
             (id, canonical_name, aliases, formulations, indication, adverse_effects, tokens)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for d in &graph.drugs {
            let aliases = serde_json::to_string(&d.aliases)?;
            stmt.execute(rusqlite::params![
                d.id, d.canonical_name, aliases, d.formulations, d.indication, d.adverse_effects,
                d.tokens,
            ])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO drug_dosages
             (id, drug_id, section_id, age_group, route, value, max, frequency,
              special_considerations, pattern)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for d in &graph.dosages {
            stmt.execute(rusqlite::params![
                d.id, d.drug_id, d.section_id, d.age_group, d.route, d.value, d.max,
                d.frequency, d.special_considerations, d.pattern,
            ])?;
        }

        let counts = serde_json::to_string(&graph.counts())?;
        tx.execute(
            "INSERT INTO runs (started_at, documents, grammar, counts) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                chrono::Utc::now().to_rfc3339(),
                documents,
                crate::parser::extract::dosage::GRAMMAR_VERSION,
                counts,
            ],
        )?;
    }
    tx.commit()?;
    Ok(())
}

// ── Stats ──

pub struct Stats {
    pub runs: usize,
    pub last_run: Option<String>,
    pub tables: Vec<(&'static str, usize)>,
}

pub const ENTITY_TABLES: &[&str] = &[
    "volumes",
    "parts",
    "chapters",
    "sections",
    "subsections",
    "content_blocks",
    "medical_conditions",
    "drugs",
    "drug_dosages",
];

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let runs: usize = conn.query_row("SELECT COUNT(*) FROM runs", [], |r| r.get(0))?;
    let last_run: Option<String> = conn
        .query_row("SELECT MAX(started_at) FROM runs", [], |r| r.get(0))?;
    let mut tables = Vec::with_capacity(ENTITY_TABLES.len());
    for table in ENTITY_TABLES {
        let n: usize =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
        tables.push((*table, n));
    }
    Ok(Stats {
        runs,
        last_run,
        tables,
    })
}

// ── Overview ──

pub struct OverviewRow {
    pub number: String,
    pub title: String,
    pub part: String,
    pub sections: usize,
    pub blocks: usize,
    pub conditions: usize,
    pub dosages: usize,
}

pub fn fetch_overview(conn: &Connection, part: Option<&str>, limit: usize) -> Result<Vec<OverviewRow>> {
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let where_clause = match part {
        Some(p) => {
            params.push(Box::new(p.to_string()));
            " WHERE p.label = ?1".to_string()
        }
        None => String::new(),
    };

    let sql = format!(
        "SELECT c.number, c.title, COALESCE(p.label, ''),
                (SELECT COUNT(*) FROM sections s WHERE s.chapter_id = c.id),
                (SELECT COUNT(*) FROM content_blocks b
                   JOIN sections s ON s.id = b.section_id WHERE s.chapter_id = c.id),
                (SELECT COUNT(*) FROM medical_conditions m
                   JOIN sections s ON s.id = m.section_id WHERE s.chapter_id = c.id),
                (SELECT COUNT(*) FROM drug_dosages d
                   JOIN sections s ON s.id = d.section_id WHERE s.chapter_id = c.id)
         FROM chapters c
         LEFT JOIN parts p ON p.id = c.part_id{}
         ORDER BY c.id
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(OverviewRow {
                number: row.get(0)?,
                title: row.get(1)?,
                part: row.get(2)?,
                sections: row.get(3)?,
                blocks: row.get(4)?,
                conditions: row.get(5)?,
                dosages: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
