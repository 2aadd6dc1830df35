use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions surfaced before any entity is emitted.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus is empty: no documents with text")]
    Empty,

    #[error("{file} is not valid UTF-8 (first bad byte at {offset})")]
    Encoding { file: String, offset: usize },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid reference dictionary: {0}")]
    Dictionary(String),

    #[error("invalid dosage grammar: {0}")]
    Grammar(String),
}
