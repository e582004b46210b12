//! Implementation of the `romforge quick` command.
//!
//! Loads the project configuration, wires the standard insertable factory
//! and the configured assembler, and runs the quick-build engine. The
//! `MustRebuild` outcome maps to exit code 2 so wrapper scripts can chain
//! into the full-build path.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};

use romforge_lib::assembler::AsarTool;
use romforge_lib::config::Configuration;
use romforge_lib::insertable::StandardFactory;
use romforge_lib::quick::{quick_build, Outcome};

use crate::output;

/// Exit code signalling that the caller must run a full build.
pub const EXIT_MUST_REBUILD: u8 = 2;

pub fn cmd_quick(config_path: &Path) -> Result<ExitCode> {
  let config = Configuration::load(config_path)
    .with_context(|| format!("failed to load configuration at {}", config_path.display()))?;

  let assembler_path = config
    .tools
    .assembler
    .clone()
    .unwrap_or_else(|| PathBuf::from("asar"));
  let assembler = AsarTool::new(assembler_path);
  let factory = StandardFactory;

  let started = Instant::now();
  let outcome = quick_build(&config, &factory, &assembler).context("quick build failed")?;

  match outcome {
    Outcome::Success(summary) => {
      output::print_success(&format!(
        "Quick build finished in {}",
        output::format_duration(started.elapsed())
      ));
      output::print_stat("Reinserted", &summary.reinserted().to_string());
      output::print_stat("Unchanged", &summary.unchanged().to_string());
      if !summary.report_written {
        output::print_warning(
          "dependency tracking was unavailable this run; the next build will be a full build",
        );
      }
      Ok(ExitCode::SUCCESS)
    }
    Outcome::NoWork => {
      output::print_info("Everything already up to date");
      Ok(ExitCode::SUCCESS)
    }
    Outcome::MustRebuild { reason } => {
      output::print_warning(&format!("Full rebuild required: {}", reason));
      Ok(ExitCode::from(EXIT_MUST_REBUILD))
    }
  }
}
