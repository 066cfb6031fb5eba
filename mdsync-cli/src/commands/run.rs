//! `mdsync run` — the sync loop in the foreground.

use anyhow::{Context, Result};
use clap::Args;

use mdsync_daemon::start_blocking;

use super::GlobalArgs;

/// Arguments for `mdsync run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Sync immediately instead of waiting one interval first.
    #[arg(long)]
    pub sync_on_start: bool,
}

impl RunArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let (mut config, source) = global.resolve().context("invalid configuration")?;
        if self.sync_on_start {
            config.sync_on_start = true;
        }
        if let Some(path) = source {
            tracing::info!(config = %path.display(), "loaded configuration");
        }
        start_blocking(config).context("sync loop exited with error")
    }
}
