//! [`GitMirror`] — clone-then-pull over the `git` command line.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::process::Command;

use mdsync_core::CommitInfo;

use crate::error::{io_err, MirrorError};
use crate::{Mirror, Refresh, RefreshOutcome};

/// `git log` format: id, author, email, commit time and subject, unit-separated.
const HEAD_FORMAT: &str = "--format=%H%x1f%an%x1f%ae%x1f%ct%x1f%s";

/// Captured result of one git invocation.
struct GitOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl GitOutput {
    fn success(&self) -> bool {
        self.status.success()
    }

    fn detail(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("git exited with {}", self.status)
        } else {
            stderr.to_string()
        }
    }
}

/// Run git with `args`, optionally inside `cwd`.
///
/// Only a failure to launch the process is an `Err`; a non-zero exit is
/// returned for the caller to classify. The child is killed if the future is
/// dropped, so cancelling a refresh stops a hanging network operation.
async fn git<I, S>(cwd: Option<&Path>, args: I) -> Result<GitOutput, MirrorError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new("git");
    if let Some(dir) = cwd {
        cmd.arg("-C").arg(dir);
    }
    cmd.args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = cmd
        .output()
        .await
        .map_err(|source| MirrorError::Spawn { source })?;
    Ok(GitOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Local working copy of a remote repository.
#[derive(Debug, Clone)]
pub struct GitMirror {
    location: String,
    local_path: PathBuf,
    reference: Option<String>,
    established: bool,
}

impl GitMirror {
    pub fn new(location: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        GitMirror {
            location: location.into(),
            local_path: local_path.into(),
            reference: None,
            established: false,
        }
    }

    /// Clone `reference` instead of the remote's default branch.
    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// A missing path, or an empty directory, is cloned into.
    async fn needs_clone(&self) -> Result<bool, MirrorError> {
        let path = &self.local_path;
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(true),
            Err(err) => return Err(io_err(path, err)),
        };
        if !metadata.is_dir() {
            return Ok(false);
        }
        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|e| io_err(path, e))?;
        let first = entries.next_entry().await.map_err(|e| io_err(path, e))?;
        Ok(first.is_none())
    }

    async fn clone_fresh(&self) -> Result<(), MirrorError> {
        tracing::info!(
            repo_url = %self.location,
            path = %self.local_path.display(),
            "cloning content repository",
        );
        let mut args: Vec<&OsStr> = vec![OsStr::new("clone"), OsStr::new("--quiet")];
        if let Some(reference) = &self.reference {
            args.push(OsStr::new("--branch"));
            args.push(OsStr::new(reference));
        }
        args.push(OsStr::new("--"));
        args.push(OsStr::new(&self.location));
        args.push(self.local_path.as_os_str());

        let out = git(None, args).await?;
        if !out.success() {
            return Err(MirrorError::Clone {
                url: self.location.clone(),
                path: self.local_path.clone(),
                detail: out.detail(),
            });
        }
        Ok(())
    }

    /// Confirm `local_path` is the root of a working tree, not merely inside one.
    async fn open(&self) -> Result<(), MirrorError> {
        let path = &self.local_path;
        let is_dir = tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(MirrorError::Open {
                path: path.clone(),
                detail: "path exists but is not a directory".to_string(),
            });
        }
        let out = git(Some(path), ["rev-parse", "--show-toplevel"]).await?;
        if !out.success() {
            return Err(MirrorError::Open {
                path: path.clone(),
                detail: out.detail(),
            });
        }
        let toplevel = PathBuf::from(out.stdout.trim());
        let expected = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| io_err(path, e))?;
        let actual = tokio::fs::canonicalize(&toplevel)
            .await
            .unwrap_or(toplevel);
        if actual != expected {
            return Err(MirrorError::Open {
                path: path.clone(),
                detail: format!("nested inside the working tree at {}", actual.display()),
            });
        }
        Ok(())
    }

    async fn head_id(&self) -> Result<String, MirrorError> {
        let out = git(Some(&self.local_path), ["rev-parse", "HEAD"]).await?;
        if !out.success() {
            return Err(MirrorError::Head {
                path: self.local_path.clone(),
                detail: out.detail(),
            });
        }
        Ok(out.stdout.trim().to_string())
    }

    async fn pull(&self) -> Result<RefreshOutcome, MirrorError> {
        let before = self.head_id().await?;
        let out = git(
            Some(&self.local_path),
            ["pull", "--ff-only", "--quiet", "origin"],
        )
        .await?;
        if !out.success() {
            return Err(MirrorError::Pull {
                path: self.local_path.clone(),
                detail: out.detail(),
            });
        }
        let after = self.head_id().await?;
        if after == before {
            Ok(RefreshOutcome::AlreadyUpToDate)
        } else {
            Ok(RefreshOutcome::Updated { previous: before })
        }
    }

    /// Resolve the commit currently checked out.
    pub async fn head_commit(&self) -> Result<CommitInfo, MirrorError> {
        let out = git(Some(&self.local_path), ["log", "-1", HEAD_FORMAT]).await?;
        if !out.success() {
            return Err(MirrorError::Head {
                path: self.local_path.clone(),
                detail: out.detail(),
            });
        }
        parse_head_line(out.stdout.trim_end()).ok_or_else(|| MirrorError::Head {
            path: self.local_path.clone(),
            detail: format!("unexpected git log output: {:?}", out.stdout),
        })
    }
}

#[async_trait]
impl Mirror for GitMirror {
    async fn refresh(&mut self) -> Result<Refresh, MirrorError> {
        let outcome = if self.needs_clone().await? {
            self.clone_fresh().await?;
            RefreshOutcome::Cloned
        } else {
            self.open().await?;
            self.pull().await?
        };
        self.established = true;

        match &outcome {
            RefreshOutcome::Cloned => tracing::info!(path = %self.local_path.display(), "mirror cloned"),
            RefreshOutcome::Updated { previous } => {
                tracing::info!(path = %self.local_path.display(), previous = %previous, "mirror updated")
            }
            RefreshOutcome::AlreadyUpToDate => {
                tracing::info!(path = %self.local_path.display(), "mirror already up to date")
            }
        }

        let head = self.head_commit().await?;
        tracing::info!(
            commit = %head.id,
            author = %head.author,
            committed_at = %head.committed_at.to_rfc3339(),
            summary = %head.summary,
            "mirror head",
        );
        Ok(Refresh { outcome, head })
    }

    fn is_established(&self) -> bool {
        self.established
    }
}

fn parse_head_line(line: &str) -> Option<CommitInfo> {
    let mut fields = line.splitn(5, '\u{1f}');
    let id = fields.next()?.to_string();
    let author = fields.next()?.to_string();
    let email = fields.next()?.to_string();
    let seconds: i64 = fields.next()?.trim().parse().ok()?;
    let summary = fields.next().unwrap_or_default().to_string();
    if id.is_empty() {
        return None;
    }
    let committed_at = Utc.timestamp_opt(seconds, 0).single()?;
    Some(CommitInfo {
        id,
        author,
        email,
        committed_at,
        summary,
    })
}
