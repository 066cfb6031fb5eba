//! `mdsync diff` — unified diffs for what `convert` would write.

use anyhow::{Context, Result};
use clap::Args;

use mdsync_sync::diff_all;

use super::GlobalArgs;

/// Arguments for `mdsync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {}

impl DiffArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let (config, _) = global.resolve().context("invalid configuration")?;
        let report = diff_all(&config.input_dir, &config.output_dir, &config.template_file)
            .with_context(|| format!("diff failed for '{}'", config.input_dir.display()))?;

        for name in &report.failed {
            eprintln!("cannot render {name}; it would fail on convert");
        }
        if report.diffs.is_empty() {
            println!("No differences ({} page(s) up to date).", report.unchanged);
            return Ok(());
        }

        for diff in report.diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
        Ok(())
    }
}
