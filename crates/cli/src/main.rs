//! romforge: command-line interface for the incremental ROM build engine.
//!
//! Provides the `romforge` command with subcommands:
//! - `romforge quick` - Replay only the insertions whose inputs changed
//! - `romforge report` - Summarize the last build's report
//!
//! A quick build that cannot safely reuse the previous output exits with
//! code 2; the caller is expected to run the full-build path then.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cmd;
mod output;

#[derive(Parser)]
#[command(name = "romforge")]
#[command(author, version, about = "Incremental ROM build tool")]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Rebuild the output ROM, replaying only the insertions whose inputs changed
  Quick {
    /// Path to the project configuration file
    #[arg(default_value = "romforge.json")]
    config: PathBuf,
  },

  /// Summarize the build report left by the last successful build
  Report {
    /// Path to the project configuration file
    #[arg(default_value = "romforge.json")]
    config: PathBuf,
  },
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
  FmtSubscriber::builder()
    .with_max_level(level)
    .with_target(false)
    .without_time()
    .init();

  match cli.command {
    Commands::Quick { config } => cmd::cmd_quick(&config),
    Commands::Report { config } => cmd::cmd_report(&config),
  }
}
