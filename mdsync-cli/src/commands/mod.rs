pub mod config;
pub mod convert;
pub mod diff;
pub mod once;
pub mod run;

use std::path::{Path, PathBuf};

use clap::Args;
use colored::Colorize;
use thiserror::Error;

use mdsync_core::{ConfigError, SyncConfig};
use mdsync_daemon::{DaemonError, LogFormat};
use mdsync_mirror::MirrorError;
use mdsync_sync::{ConvertReport, DocumentOutcome, SyncError};

/// Flags shared by every subcommand. Each one overrides the config file.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Config file (defaults to ./mdsync.yaml when present).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Repository to mirror.
    #[arg(long, global = true, value_name = "URL")]
    pub repo: Option<String>,

    /// Local mirror directory; its top-level files are converted.
    #[arg(long, global = true, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Directory the HTML pages are written to.
    #[arg(long, global = true, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Page template file.
    #[arg(long, global = true, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Seconds between sync cycles.
    #[arg(long, global = true)]
    pub interval_secs: Option<u64>,

    /// Conversion worker threads.
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Log line format: text or json.
    #[arg(long, global = true, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl GlobalArgs {
    /// Load the config file (if any), apply flag overrides and validate.
    pub fn resolve(&self) -> Result<(SyncConfig, Option<PathBuf>), ConfigError> {
        let (mut config, source) = SyncConfig::discover(self.config.as_deref(), Path::new("."))?;
        if let Some(repo) = &self.repo {
            config.repo_url = repo.clone();
        }
        if let Some(input) = &self.input {
            config.input_dir = input.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(template) = &self.template {
            config.template_file = template.clone();
        }
        if let Some(secs) = self.interval_secs {
            config.interval_secs = secs;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.validate()?;
        Ok((config, source))
    }
}

/// A conversion finished but some documents were not published.
#[derive(Debug, Error)]
#[error("{failed} document(s) failed to convert")]
pub struct IncompleteConversion {
    pub failed: usize,
}

/// Map an error chain onto the documented process exit codes.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(err) = cause.downcast_ref::<DaemonError>() {
            return err.exit_code();
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return 2;
        }
        if cause.downcast_ref::<MirrorError>().is_some() {
            return 3;
        }
        if let Some(err) = cause.downcast_ref::<SyncError>() {
            return match err {
                SyncError::DirectoryMissing { .. } => 4,
                _ => 5,
            };
        }
        if cause.downcast_ref::<IncompleteConversion>().is_some() {
            return 5;
        }
    }
    1
}

/// Human summary of a conversion, one line per document.
pub fn print_report(report: &ConvertReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    if let Some(err) = &report.template_error {
        println!("{prefix}{} template unusable: {err}", "✗".red());
    }
    if report.outcomes.is_empty() {
        println!("{prefix}✓ nothing to convert in {}", report.input_dir.display());
        return;
    }

    let mark = if report.is_clean() { "✓".green() } else { "!".yellow() };
    println!(
        "{prefix}{mark} {} → {} ({} written, {} skipped, {} failed)",
        report.input_dir.display(),
        report.output_dir.display(),
        report.written(),
        report.skipped(),
        report.failed(),
    );
    for outcome in &report.outcomes {
        match outcome {
            DocumentOutcome::Written { path, .. } => println!("  ✎  {}", path.display()),
            DocumentOutcome::WouldWrite { path, .. } => println!("  ~  {}", path.display()),
            DocumentOutcome::Skipped { name, .. } => println!("  ·  {name} (directory)"),
            DocumentOutcome::Failed { name, error, .. } => {
                println!("  {}  {name}: {error}", "✗".red())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn exit_codes_follow_the_error_chain() {
        let missing: anyhow::Error = SyncError::DirectoryMissing {
            path: PathBuf::from("./input"),
        }
        .into();
        assert_eq!(exit_code(&missing), 4);

        let config = Err::<(), _>(ConfigError::NotFound {
            path: PathBuf::from("mdsync.yaml"),
        })
        .context("loading configuration")
        .unwrap_err();
        assert_eq!(exit_code(&config), 2);

        let wrapped: anyhow::Error = DaemonError::from(MirrorError::Pull {
            path: PathBuf::from("./input"),
            detail: "offline".to_string(),
        })
        .into();
        assert_eq!(exit_code(&wrapped), 3);

        assert_eq!(exit_code(&IncompleteConversion { failed: 2 }.into()), 5);
        assert_eq!(exit_code(&anyhow::anyhow!("something else")), 1);
    }
}
