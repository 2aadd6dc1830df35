use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::CorpusError;
use crate::utils::natural_cmp;

/// One input slice of the source volume.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub text: String,
}

impl Document {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Document {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Decode raw bytes; invalid UTF-8 is fatal for the whole corpus.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, CorpusError> {
        let name = name.into();
        match String::from_utf8(bytes) {
            Ok(text) => Ok(Document { name, text }),
            Err(e) => Err(CorpusError::Encoding {
                file: name,
                offset: e.utf8_error().valid_up_to(),
            }),
        }
    }
}

/// List the `*.txt` files of a directory in natural filename order.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, CorpusError> {
    let entries = std::fs::read_dir(dir).map_err(|source| CorpusError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| CorpusError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            files.push(path);
        }
    }
    files.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    info!("Discovered {} text files in {}", files.len(), dir.display());
    Ok(files)
}

/// Read and decode every file, in the given order.
pub fn load(paths: &[PathBuf]) -> Result<Vec<Document>, CorpusError> {
    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = std::fs::read(path).map_err(|source| CorpusError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("Loaded {} ({} bytes)", path.display(), bytes.len());
        docs.push(Document::from_bytes(file_name(path), bytes)?);
    }
    Ok(docs)
}

/// An empty corpus is fatal; reject it before any entity is built.
pub fn ensure_not_empty(docs: &[Document]) -> Result<(), CorpusError> {
    if docs.iter().all(|d| d.text.trim().is_empty()) {
        return Err(CorpusError::Empty);
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_utf8_is_fatal() {
        let err = Document::from_bytes("bad.txt", vec![b'o', b'k', 0xff, b'x']).unwrap_err();
        match err {
            CorpusError::Encoding { file, offset } => {
                assert_eq!(file, "bad.txt");
                assert_eq!(offset, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_corpus_rejected() {
        assert!(matches!(ensure_not_empty(&[]), Err(CorpusError::Empty)));
        let blank = vec![Document::new("a.txt", "  \n\n")];
        assert!(matches!(ensure_not_empty(&blank), Err(CorpusError::Empty)));
        let ok = vec![Document::new("a.txt", "text")];
        assert!(ensure_not_empty(&ok).is_ok());
    }

    #[test]
    fn discovers_fixtures_in_natural_order() {
        let files = discover(Path::new("tests/fixtures/corpus")).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(
            names,
            vec!["nelson_part_1.txt", "nelson_part_2.txt", "nelson_part_10.txt"]
        );
        let docs = load(&files).unwrap();
        assert_eq!(docs.len(), 3);
        assert!(ensure_not_empty(&docs).is_ok());
    }

    #[test]
    fn missing_directory_is_io_error() {
        let err = discover(Path::new("tests/fixtures/does-not-exist")).unwrap_err();
        assert!(matches!(err, CorpusError::Io { .. }));
    }
}
