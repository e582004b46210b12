//! The change detector.
//!
//! Two layers of checks decide what a quick build may reuse. The per-report
//! checks run once, fail fast, and any violation invalidates the whole ROM.
//! The per-entry classification then decides, for each build-order
//! position, whether its insertion must be replayed.
//!
//! `Rebuild`-policy resource dependencies are deliberately checked forward
//! from the current entry only, inside the drive loop: once an earlier
//! entry reinserts, its downstream resources are expected to change, and
//! re-checking them would be spurious.

use std::path::Path;

use tracing::{debug, info};

use crate::config::Configuration;
use crate::consts::BUILD_REPORT_VERSION;
use crate::dependency::{ConfigurationDependency, Policy, ResourceDependency};
use crate::error::EngineError;
use crate::levels::scan_level_numbers;
use crate::report::{BuildReport, Entry};

/// Per-report fail-fast checks, in order. Any violation forces a rebuild.
pub fn run_report_checks(report: &BuildReport, config: &Configuration) -> Result<(), EngineError> {
  info!("checking whether the ROM from the previous build exists");
  if !config.output_rom.exists() {
    return Err(EngineError::MustRebuild(format!(
      "no ROM found at '{}'",
      config.output_rom.display()
    )));
  }

  info!("checking whether the configured ROM size has changed");
  if report.rom_size != config.rom_size {
    return Err(EngineError::MustRebuild("configured ROM size has changed".to_string()));
  }

  info!("checking whether the build report format has changed");
  if report.file_format_version != BUILD_REPORT_VERSION {
    return Err(EngineError::MustRebuild("build report format has changed".to_string()));
  }

  info!("checking whether the build order has changed");
  if report.build_order != config.build_order {
    return Err(EngineError::MustRebuild("build order has changed".to_string()));
  }

  if let Some(levels_dir) = &config.paths.levels {
    info!("checking whether level files have been removed since the last build");
    check_level_removals(levels_dir, report)?;
  }

  info!("checking whether any configuration changes require a rebuild");
  check_rebuild_config_dependencies(report, config)?;

  Ok(())
}

/// Removed level files invalidate the ROM; extra ones are picked up by the
/// levels insertable on its own reinsertion and are fine.
fn check_level_removals(levels_dir: &Path, report: &BuildReport) -> Result<(), EngineError> {
  if !levels_dir.exists() {
    return Err(EngineError::Insertion(format!(
      "configured levels folder at '{}' does not exist, but levels were previously inserted into this ROM; \
       unset the levels path if levels should no longer be inserted",
      levels_dir.display()
    )));
  }

  let current = scan_level_numbers(levels_dir)?;
  let removed = report.inserted_levels.iter().filter(|l| !current.contains(l)).count();
  if removed != 0 {
    return Err(EngineError::MustRebuild(format!(
      "{} previously inserted level file{} been removed",
      removed,
      if removed == 1 { " has" } else { "s have" }
    )));
  }
  Ok(())
}

fn check_rebuild_config_dependencies(report: &BuildReport, config: &Configuration) -> Result<(), EngineError> {
  for entry in &report.dependencies {
    for dependency in &entry.configuration_dependencies {
      if dependency.policy != Policy::Rebuild {
        continue;
      }
      let current = config.value_by_key(&dependency.config_keys);
      if current != dependency.value {
        return Err(EngineError::MustRebuild(format!(
          "value of {} has changed",
          dependency.config_keys
        )));
      }
    }
  }
  Ok(())
}

/// `Rebuild`-policy resource check across `entries`, the tail of the build
/// order starting at the entry currently being processed.
pub fn check_rebuild_resources(entries: &[Entry], project_root: &Path) -> Result<(), EngineError> {
  for entry in entries {
    for dependency in &entry.resource_dependencies {
      if dependency.policy != Policy::Rebuild {
        continue;
      }
      if !dependency.is_unchanged() {
        return Err(EngineError::MustRebuild(format!(
          "dependency '{}' of '{}' has changed",
          dependency.dependent_path.display(),
          entry.descriptor.to_display_string(project_root)
        )));
      }
    }
  }
  Ok(())
}

/// First changed `Reinsert`-policy configuration dependency, if any.
pub fn reinsert_config_change<'e>(
  entry: &'e Entry,
  config: &Configuration,
) -> Option<&'e ConfigurationDependency> {
  entry
    .configuration_dependencies
    .iter()
    .filter(|d| d.policy == Policy::Reinsert)
    .find(|d| config.value_by_key(&d.config_keys) != d.value)
}

/// First changed `Reinsert`-policy resource dependency, if any.
pub fn reinsert_resource_change(entry: &Entry) -> Option<&ResourceDependency> {
  entry
    .resource_dependencies
    .iter()
    .filter(|d| d.policy == Policy::Reinsert)
    .find(|d| {
      let changed = !d.is_unchanged();
      if changed {
        debug!(path = %d.dependent_path.display(), "resource changed");
      }
      changed
    })
}
