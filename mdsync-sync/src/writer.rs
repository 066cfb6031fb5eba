//! Atomic page writer.
//!
//! 1. Write the page bytes to `<path>.mdsync.tmp`.
//! 2. Rename to the final path (atomic on POSIX), replacing any previous page.
//! 3. On rename failure remove the temporary file and leave the old page intact.
//!
//! The web server reading the output directory therefore never observes a
//! half-written page.

use std::path::{Path, PathBuf};

use crate::error::DocumentError;

/// Outcome of an individual page write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Page was written (created or replaced).
    Written { path: PathBuf },
    /// `--dry-run` mode: the page *would* have been written.
    WouldWrite { path: PathBuf },
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".mdsync.tmp");
    PathBuf::from(name)
}

/// Atomically replace the page at `path` with `content`.
pub fn atomic_write(
    path: &Path,
    content: &[u8],
    dry_run: bool,
) -> Result<WriteResult, DocumentError> {
    atomic_write_with_tmp(path, content, dry_run, &tmp_path_for(path))
}

fn atomic_write_with_tmp(
    path: &Path,
    content: &[u8],
    dry_run: bool,
    tmp: &Path,
) -> Result<WriteResult, DocumentError> {
    if dry_run {
        tracing::debug!("[dry-run] would write: {}", path.display());
        return Ok(WriteResult::WouldWrite {
            path: path.to_path_buf(),
        });
    }

    std::fs::write(tmp, content).map_err(|source| DocumentError::Write {
        path: tmp.to_path_buf(),
        source,
    })?;

    if let Err(source) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(DocumentError::Write {
            path: path.to_path_buf(),
            source,
        });
    }

    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
