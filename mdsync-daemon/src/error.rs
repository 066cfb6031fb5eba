use std::path::PathBuf;

use thiserror::Error;

use mdsync_core::ConfigError;
use mdsync_mirror::MirrorError;
use mdsync_sync::SyncError;

/// Error surface for the sync loop runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("mirror error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("conversion error: {0}")]
    Sync(#[from] SyncError),

    #[error("giving up after {failures} consecutive failed cycles: {last}")]
    RetriesExhausted {
        failures: u32,
        #[source]
        last: Box<DaemonError>,
    },

    #[error("runtime task error: {0}")]
    Task(String),
}

/// How the loop treats a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// May succeed on a later cycle (network, remote, output I/O).
    Transient,
    /// Cannot succeed without operator action.
    Structural,
}

impl DaemonError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DaemonError::Mirror(err) if err.is_structural() => ErrorClass::Structural,
            DaemonError::Mirror(_) => ErrorClass::Transient,
            DaemonError::Sync(SyncError::OutputDir { .. } | SyncError::Io { .. }) => {
                ErrorClass::Transient
            }
            _ => ErrorClass::Structural,
        }
    }

    /// Process exit code for a fatal error.
    ///
    /// 1 runtime, 2 configuration, 3 mirror, 4 input directory missing,
    /// 5 output or conversion I/O.
    pub fn exit_code(&self) -> u8 {
        match self {
            DaemonError::Io { .. } | DaemonError::Task(_) => 1,
            DaemonError::Config(_) => 2,
            DaemonError::Mirror(_) => 3,
            DaemonError::Sync(SyncError::DirectoryMissing { .. }) => 4,
            DaemonError::Sync(_) => 5,
            DaemonError::RetriesExhausted { last, .. } => last.exit_code(),
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
