use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::parser::extract::EntityGraph;

/// Write one `<kind>.jsonl` file per entity kind under `dir`, rows in id order.
pub fn write_jsonl_dir(graph: &EntityGraph, dir: &Path) -> Result<Vec<PathBuf>> {
    create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let paths = vec![
        write_rows(dir, "volumes", &graph.volumes)?,
        write_rows(dir, "parts", &graph.parts)?,
        write_rows(dir, "chapters", &graph.chapters)?,
        write_rows(dir, "sections", &graph.sections)?,
        write_rows(dir, "subsections", &graph.subsections)?,
        write_rows(dir, "content_blocks", &graph.content_blocks)?,
        write_rows(dir, "medical_conditions", &graph.conditions)?,
        write_rows(dir, "drugs", &graph.drugs)?,
        write_rows(dir, "drug_dosages", &graph.dosages)?,
    ];
    info!(dir = %dir.display(), files = paths.len(), "JSONL export written");
    Ok(paths)
}

fn write_rows<T: Serialize>(dir: &Path, kind: &str, rows: &[T]) -> Result<PathBuf> {
    let path = dir.join(format!("{}.jsonl", kind));
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(path)
}
