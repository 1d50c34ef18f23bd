use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building class files or extracting bin taxonomy.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read table: {0}")]
    Table(#[from] csv::Error),

    #[error("htslib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    #[error("{path}:{line}: expected at least {expected} tab-separated columns, found {found}")]
    MalformedRow {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("{path}:{line}: point ID '{value}' is not an integer")]
    InvalidPointId {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("--taxonomy and --tax-level must be specified together")]
    MissingRank,

    #[error("coverage threshold must be between 0 and 100, got {0}")]
    InvalidCoverage(f64),

    #[error("reference '{0}' not found in alignment or length source")]
    UnknownReference(String),

    #[error("failed to load FASTA index for {path}: {message}")]
    FastaIndex { path: PathBuf, message: String },
}

impl TraceError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TraceError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TraceError>;
