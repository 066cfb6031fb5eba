//! `mdsync convert` — convert the mirror as it is, without touching git.

use anyhow::{Context, Result};
use clap::Args;

use mdsync_sync::{convert_all, ConvertOptions};

use super::{print_report, GlobalArgs, IncompleteConversion};

/// Arguments for `mdsync convert`.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Show what would be written without writing any files.
    #[arg(long)]
    pub dry_run: bool,
}

impl ConvertArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let (config, _) = global.resolve().context("invalid configuration")?;
        let options = ConvertOptions {
            workers: config.workers,
            dry_run: self.dry_run,
        };
        let report = convert_all(
            &config.input_dir,
            &config.output_dir,
            &config.template_file,
            &options,
        )
        .with_context(|| format!("convert failed for '{}'", config.input_dir.display()))?;

        print_report(&report, self.dry_run);
        match report.failed() {
            0 => Ok(()),
            failed => Err(IncompleteConversion { failed }.into()),
        }
    }
}
