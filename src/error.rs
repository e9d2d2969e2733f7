//! Error taxonomy for the indexing pipeline.
//!
//! Fatal errors (`Validation`, `StoreOpen`, `StoreClose`, `Walk`, `Sql`)
//! abort the current invocation. Per-file errors (`Io`, `Insert`) are
//! recovered by the ingestion coordinator: the file is skipped, the failure
//! is logged and recorded in the [`IngestReport`](crate::ingest::IngestReport).

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    /// A required parameter is missing or invalid. Raised before any I/O.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("cannot open index store {}: {message}", path.display())]
    StoreOpen { path: PathBuf, message: String },

    #[error("cannot close index store: {0}")]
    StoreClose(String),

    /// The walk root is missing or unreadable.
    #[error("cannot walk {}: {message}", root.display())]
    Walk { root: PathBuf, message: String },

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot insert record for {}: {message}", path.display())]
    Insert { path: PathBuf, message: String },

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl IndexError {
    /// Whether this error belongs to a single file and must not abort a run.
    pub fn is_per_file(&self) -> bool {
        matches!(self, IndexError::Io { .. } | IndexError::Insert { .. })
    }
}
