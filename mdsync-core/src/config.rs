//! Runtime configuration.
//!
//! Every field has a default, so an empty (or absent) `mdsync.yaml` yields a
//! working setup:
//!
//! ```yaml
//! repo_url: https://github.com/octetz/sample-md
//! input_dir: ./input
//! output_dir: ./output
//! template_file: template.html
//! interval_secs: 30
//! sync_on_start: false
//! workers: 1
//! failure:
//!   on_error: retry
//!   initial_backoff_secs: 5
//!   max_backoff_secs: 300
//! ```

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "mdsync.yaml";
pub const DEFAULT_REPO_URL: &str = "https://github.com/octetz/sample-md";
pub const DEFAULT_INPUT_DIR: &str = "./input";
pub const DEFAULT_OUTPUT_DIR: &str = "./output";
pub const DEFAULT_TEMPLATE_FILE: &str = "template.html";
pub const DEFAULT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_INITIAL_BACKOFF_SECS: u64 = 5;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 300;

/// What the sync loop does when a cycle fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Retry transient failures with backoff; stop only on structural ones.
    #[default]
    Retry,
    /// Stop on the first refresh or conversion failure.
    Fatal,
}

/// Retry/termination policy for failed cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    pub on_error: ErrorMode,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    /// Stop after this many consecutive transient failures. `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy {
            on_error: ErrorMode::default(),
            initial_backoff_secs: DEFAULT_INITIAL_BACKOFF_SECS,
            max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
            max_consecutive_failures: None,
        }
    }
}

impl FailurePolicy {
    /// Delay before retrying after the `failures`-th consecutive failure.
    ///
    /// `initial · 2^(failures-1)`, capped at `max_backoff_secs`.
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(32);
        let secs = self
            .initial_backoff_secs
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_secs);
        Duration::from_secs(secs)
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Location of the remote repository.
    pub repo_url: String,
    /// Branch to clone. `None` uses the remote's default branch.
    pub reference: Option<String>,
    /// Local mirror; its top-level files are the documents.
    pub input_dir: PathBuf,
    /// Generated pages land here.
    pub output_dir: PathBuf,
    /// Page template, re-read every cycle.
    pub template_file: PathBuf,
    pub interval_secs: u64,
    /// Run the first cycle immediately instead of after one interval.
    pub sync_on_start: bool,
    /// Size of the per-document conversion pool.
    pub workers: usize,
    pub failure: FailurePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            repo_url: DEFAULT_REPO_URL.to_string(),
            reference: None,
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            template_file: PathBuf::from(DEFAULT_TEMPLATE_FILE),
            interval_secs: DEFAULT_INTERVAL_SECS,
            sync_on_start: false,
            workers: 1,
            failure: FailurePolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Load and validate the YAML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_at(&contents, path)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration for a run.
    ///
    /// An explicit path must exist. Without one, `<dir>/mdsync.yaml` is used
    /// when present, otherwise the defaults. Returns the file that was read.
    pub fn discover(
        explicit: Option<&Path>,
        dir: &Path,
    ) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }
        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            return Ok((Self::load(&candidate)?, Some(candidate)));
        }
        Ok((Self::default(), None))
    }

    fn from_yaml_at(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit; treat it as "all defaults".
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repo_url.trim().is_empty() {
            return Err(invalid("repo_url", "must not be empty"));
        }
        if self.interval_secs == 0 {
            return Err(invalid("interval_secs", "must be at least 1"));
        }
        if self.workers == 0 {
            return Err(invalid("workers", "must be at least 1"));
        }
        if self.failure.initial_backoff_secs > self.failure.max_backoff_secs {
            return Err(invalid(
                "failure.initial_backoff_secs",
                "must not exceed failure.max_backoff_secs",
            ));
        }
        if self.failure.max_consecutive_failures == Some(0) {
            return Err(invalid("failure.max_consecutive_failures", "must be at least 1"));
        }
        if lexical(&self.input_dir) == lexical(&self.output_dir) {
            return Err(invalid("output_dir", "must differ from input_dir"));
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// `path` without `.` components, so `./input`, `input` and `input/.` compare equal.
fn lexical(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
