//! `mdsync once` — a single refresh + convert cycle.

use anyhow::{Context, Result};
use clap::Args;

use mdsync_daemon::once_blocking;

use super::{print_report, GlobalArgs, IncompleteConversion};

/// Arguments for `mdsync once`.
#[derive(Args, Debug)]
pub struct OnceArgs {
    /// Emit the cycle report as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

impl OnceArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let (config, _) = global.resolve().context("invalid configuration")?;
        let report = once_blocking(config).context("sync cycle failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to encode report")?
            );
        } else {
            println!("head {}", report.refresh.head);
            print_report(&report.conversion, false);
        }

        match report.conversion.failed() {
            0 => Ok(()),
            failed => Err(IncompleteConversion { failed }.into()),
        }
    }
}
