//! mdsync — mirror a markdown repository and publish it as HTML pages.
//!
//! # Usage
//!
//! ```text
//! mdsync [global flags] run [--sync-on-start]
//! mdsync [global flags] once [--json]
//! mdsync [global flags] convert [--dry-run]
//! mdsync [global flags] diff
//! mdsync [global flags] config
//! ```

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{
    config::ConfigArgs, convert::ConvertArgs, diff::DiffArgs, once::OnceArgs, run::RunArgs,
    GlobalArgs,
};
use mdsync_daemon::{init_tracing, LogTarget};

#[derive(Parser, Debug)]
#[command(
    name = "mdsync",
    version,
    about = "Keep a directory of HTML pages in sync with a markdown git repository",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the sync loop in the foreground until interrupted.
    Run(RunArgs),

    /// Refresh the mirror and convert once, then exit.
    Once(OnceArgs),

    /// Convert the current mirror contents without refreshing.
    Convert(ConvertArgs),

    /// Show unified diffs of what `convert` would change.
    Diff(DiffArgs),

    /// Print the effective configuration as YAML.
    Config(ConfigArgs),
}

impl Commands {
    /// Commands whose stdout is meant for machines get their logs on stderr.
    fn log_target(&self) -> LogTarget {
        match self {
            Commands::Once(args) if args.json => LogTarget::Stderr,
            Commands::Diff(_) | Commands::Config(_) => LogTarget::Stderr,
            _ => LogTarget::Stdout,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.log_format, cli.command.log_target());

    let result = match cli.command {
        Commands::Run(args) => args.run(&cli.global),
        Commands::Once(args) => args.run(&cli.global),
        Commands::Convert(args) => args.run(&cli.global),
        Commands::Diff(args) => args.run(&cli.global),
        Commands::Config(args) => args.run(&cli.global),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(commands::exit_code(&err))
        }
    }
}
