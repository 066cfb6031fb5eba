use std::path::PathBuf;

use thiserror::Error;

/// Error surface for mirror clone/open/pull operations.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("failed to launch git: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git clone of {url} into {path} failed: {detail}")]
    Clone {
        url: String,
        path: PathBuf,
        detail: String,
    },

    #[error("{path} is not a git working tree: {detail}")]
    Open { path: PathBuf, detail: String },

    #[error("git pull in {path} failed: {detail}")]
    Pull { path: PathBuf, detail: String },

    #[error("could not resolve head commit in {path}: {detail}")]
    Head { path: PathBuf, detail: String },
}

impl MirrorError {
    /// Retrying cannot fix a structural error: the mirror path is occupied by
    /// something that is not a working tree, or git cannot be run at all.
    pub fn is_structural(&self) -> bool {
        matches!(self, MirrorError::Spawn { .. } | MirrorError::Open { .. })
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> MirrorError {
    MirrorError::Io {
        path: path.into(),
        source,
    }
}
