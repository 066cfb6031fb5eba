//! Error types for mdsync-sync.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use mdsync_renderer::RenderError;

/// Errors that abort a whole conversion run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The input directory does not exist (or is not a directory).
    #[error("input directory missing: {path}")]
    DirectoryMissing { path: PathBuf },

    /// The output directory could not be created.
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The page template is unusable (diff only; conversion records it per document).
    #[error("template error: {0}")]
    Template(#[from] RenderError),

    /// The conversion worker pool could not be started.
    #[error("worker pool error: {0}")]
    Pool(String),
}

impl SyncError {
    /// Missing input is structural: no amount of retrying recreates it.
    pub fn is_structural(&self) -> bool {
        matches!(self, SyncError::DirectoryMissing { .. })
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Pipeline step at which a single document failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Read,
    Template,
    Write,
}

/// A failure confined to one document. Never aborts the batch.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template error: {0}")]
    Template(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    pub fn stage(&self) -> FailureStage {
        match self {
            DocumentError::Read { .. } => FailureStage::Read,
            DocumentError::Template(_) => FailureStage::Template,
            DocumentError::Write { .. } => FailureStage::Write,
        }
    }
}
