//! Local mirror of the content repository.
//!
//! [`Mirror`] is the seam the sync loop drives; [`GitMirror`] implements it by
//! shelling out to the `git` executable. The first refresh clones, every later
//! refresh fast-forward pulls into the same working tree.

mod error;
pub mod git;

use async_trait::async_trait;
use serde::Serialize;

use mdsync_core::CommitInfo;

pub use error::MirrorError;
pub use git::GitMirror;

/// What a successful refresh did to the working tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The working tree was created by a fresh clone.
    Cloned,
    /// A pull moved head from `previous` to a newer commit.
    Updated { previous: String },
    /// The pull found nothing new. Expected steady state, not an error.
    AlreadyUpToDate,
}

/// Result of [`Mirror::refresh`]: the outcome plus the commit now checked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Refresh {
    pub outcome: RefreshOutcome,
    pub head: CommitInfo,
}

/// A local working copy that can be brought up to date with its source.
#[async_trait]
pub trait Mirror: Send {
    /// Create the working copy if needed, otherwise update it.
    async fn refresh(&mut self) -> Result<Refresh, MirrorError>;

    /// Whether a working copy has been successfully established.
    fn is_established(&self) -> bool;
}
