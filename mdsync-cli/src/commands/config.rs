//! `mdsync config` — print the effective configuration.

use anyhow::{Context, Result};
use clap::Args;

use super::GlobalArgs;

/// Arguments for `mdsync config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {}

impl ConfigArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let (config, source) = global.resolve().context("invalid configuration")?;
        match source {
            Some(path) => println!("# source: {}", path.display()),
            None => println!("# source: built-in defaults"),
        }
        print!("{}", config.to_yaml().context("failed to encode configuration")?);
        Ok(())
    }
}
