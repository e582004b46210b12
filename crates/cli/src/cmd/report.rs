//! Implementation of the `romforge report` command.
//!
//! Prints a human-readable summary of the build report left by the last
//! successful build: one line per build-order entry with its dependency
//! counts, plus the inserted levels and cached module outputs.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use romforge_lib::config::Configuration;
use romforge_lib::report::ReportStore;

use crate::output;

pub fn cmd_report(config_path: &Path) -> Result<ExitCode> {
  let config = Configuration::load(config_path)
    .with_context(|| format!("failed to load configuration at {}", config_path.display()))?;

  let store = ReportStore::for_project(&config.project_root);
  let report = match store.load().context("failed to read build report")? {
    Some(report) => report,
    None => {
      output::print_info("No build report found; the next build will be a full build");
      return Ok(ExitCode::SUCCESS);
    }
  };

  println!("Build report at {}", store.path().display());
  output::print_stat("Format version", &report.file_format_version.to_string());
  output::print_stat(
    "ROM size",
    &report
      .rom_size
      .map(|s| s.to_string())
      .unwrap_or_else(|| "unset".to_string()),
  );
  output::print_stat("Inserted levels", &report.inserted_levels.len().to_string());
  output::print_stat("Modules with outputs", &report.module_outputs.len().to_string());

  println!();
  println!("Build order:");
  for entry in &report.dependencies {
    let mut details = vec![
      format!("{} config deps", entry.configuration_dependencies.len()),
      format!("{} resource deps", entry.resource_dependencies.len()),
    ];
    if let Some(hijacks) = &entry.hijacks {
      details.push(format!("{} hijacks", hijacks.len()));
    }
    println!(
      "  {} ({})",
      entry.descriptor.to_display_string(&config.project_root),
      details.join(", ")
    );
  }

  Ok(ExitCode::SUCCESS)
}
