//! Quick-build orchestration.
//!
//! The driver replays as few insertions as possible against a copy of the
//! previous output ROM:
//!
//! 1. Load the build report (absent or unreadable means a full rebuild)
//! 2. Run the per-report fail-fast checks
//! 3. Walk the build order; classify each entry and replay the changed ones
//! 4. Commit: persist the report, cache module outputs, stamp the marker,
//!    atomically publish the ROM, link graphics folders
//!
//! A `MustRebuild` raised anywhere inside becomes the
//! [`Outcome::MustRebuild`] mode switch at this boundary; the previous
//! output and report stay valid because the temporary ROM is only moved
//! into place after everything else succeeded.

use std::path::Path;

use tracing::{info, warn};

use crate::assembler::Assembler;
use crate::config::Configuration;
use crate::descriptor::{Descriptor, Symbol};
use crate::detector;
use crate::error::EngineError;
use crate::gfx;
use crate::hijacks::hijacks_gone_bad;
use crate::insertable::{InsertableFactory, InsertionContext};
use crate::marker;
use crate::modules;
use crate::paths;
use crate::report::ReportStore;

/// How one entry ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDisposition {
  Unchanged,
  Reinserted,
  /// Reinserted, but dependency bookkeeping was lost for the rest of the
  /// run.
  DependencyReportLost,
}

/// What a successful quick build did.
#[derive(Debug, Default)]
pub struct RunSummary {
  pub dispositions: Vec<(Descriptor, EntryDisposition)>,
  /// False when the report was deleted because an insertable refused to
  /// report its dependencies.
  pub report_written: bool,
}

impl RunSummary {
  pub fn reinserted(&self) -> usize {
    self
      .dispositions
      .iter()
      .filter(|(_, d)| !matches!(d, EntryDisposition::Unchanged))
      .count()
  }

  pub fn unchanged(&self) -> usize {
    self.dispositions.len() - self.reinserted()
  }
}

/// Exit contract of a quick build.
#[derive(Debug)]
pub enum Outcome {
  /// The output ROM was replaced and is equivalent to a full rebuild.
  Success(RunSummary),
  /// Nothing changed; the previous output stands.
  NoWork,
  /// Incremental reuse is unsafe or impossible; run the full-build path.
  MustRebuild { reason: String },
}

/// Run a quick build.
///
/// `MustRebuild` is returned inside the [`Outcome`], not as an error; every
/// `Err` is fatal to this run.
pub fn quick_build(
  config: &Configuration,
  factory: &dyn InsertableFactory,
  assembler: &dyn Assembler,
) -> Result<Outcome, EngineError> {
  match run(config, factory, assembler) {
    Err(EngineError::MustRebuild(reason)) => {
      info!(%reason, "quick build not applicable");
      Ok(Outcome::MustRebuild { reason })
    }
    other => other,
  }
}

fn run(
  config: &Configuration,
  factory: &dyn InsertableFactory,
  assembler: &dyn Assembler,
) -> Result<Outcome, EngineError> {
  info!("quick build started");
  config.validate()?;

  let store = ReportStore::for_project(&config.project_root);
  let mut report = match store.load() {
    Ok(Some(report)) => report,
    Ok(None) => {
      return Err(EngineError::MustRebuild(format!(
        "no build report found at '{}'",
        store.path().display()
      )))
    }
    Err(error) => {
      warn!(%error, "build report unreadable");
      return Err(EngineError::MustRebuild("build report is unreadable".to_string()));
    }
  };

  if !report.is_consistent() {
    return Err(EngineError::MustRebuild("build report is inconsistent".to_string()));
  }

  detector::run_report_checks(&report, config)?;

  let temporary_folder = config.temporary_folder();
  let temporary_rom = paths::temporary_rom_path(&temporary_folder, &config.output_rom);

  let mut any_work_done = false;
  let mut lost_report: Option<String> = None;
  let mut dispositions = Vec::with_capacity(report.dependencies.len());

  for index in 0..report.dependencies.len() {
    // Forward-only on purpose: resources of entries before `index` are
    // re-observed when those entries reinsert, so re-checking them here
    // would flag expected changes.
    detector::check_rebuild_resources(&report.dependencies[index..], &config.project_root)?;

    let descriptor = report.dependencies[index].descriptor.clone();
    let descriptor_string = descriptor.to_display_string(&config.project_root);

    let must_reinsert = {
      let entry = &report.dependencies[index];
      if let Some(dependency) = detector::reinsert_config_change(entry, config) {
        info!(
          entry = %descriptor_string,
          key = %dependency.config_keys,
          "must be reinserted due to a configuration change"
        );
        true
      } else if let Some(dependency) = detector::reinsert_resource_change(entry) {
        let shown = dependency
          .dependent_path
          .strip_prefix(&config.project_root)
          .unwrap_or(&dependency.dependent_path);
        info!(
          entry = %descriptor_string,
          resource = %shown.display(),
          "must be reinserted due to a resource change"
        );
        true
      } else {
        false
      }
    };

    if !must_reinsert {
      if descriptor.symbol == Symbol::Module {
        let outputs = module_outputs_for(&report, config, &descriptor);
        modules::restore_module_outputs(&outputs, config)?;
      }
      info!(entry = %descriptor_string, "already up to date");
      dispositions.push((descriptor, EntryDisposition::Unchanged));
      continue;
    }

    if !any_work_done {
      any_work_done = true;
      std::fs::create_dir_all(&temporary_folder)?;
      std::fs::copy(&config.output_rom, &temporary_rom)?;
    }

    if descriptor.symbol == Symbol::Module {
      let source = module_source(config, &descriptor)?;
      modules::clean_module(assembler, &source, &temporary_rom, config)?;
    }

    let ctx = InsertionContext {
      config,
      temporary_rom: &temporary_rom,
      assembler,
    };
    let mut insertable = factory.create(&descriptor, &ctx)?;
    insertable.init()?;

    if lost_report.is_none() {
      match insertable.insert_with_dependencies() {
        Ok(resource_dependencies) => {
          let entry = &mut report.dependencies[index];
          entry.configuration_dependencies = insertable.configuration_dependencies();
          entry.resource_dependencies = resource_dependencies.into_iter().collect();
        }
        Err(EngineError::NoDependencyReport(who)) => {
          warn!(entry = %descriptor_string, "insertable produced no dependency report");
          lost_report = Some(who);
        }
        Err(error) => return Err(error),
      }
    } else {
      insertable.insert()?;
    }

    if descriptor.symbol == Symbol::Patch {
      let old_hijacks = report.dependencies[index].hijacks.clone().unwrap_or_default();
      let new_hijacks = insertable.hijacks().unwrap_or_default();
      if hijacks_gone_bad(&old_hijacks, &new_hijacks) {
        return Err(EngineError::MustRebuild(format!(
          "hijacks of {} have changed",
          descriptor_string
        )));
      }
      report.dependencies[index].hijacks = Some(new_hijacks);
    }

    let disposition = if lost_report.is_some() {
      EntryDisposition::DependencyReportLost
    } else {
      EntryDisposition::Reinserted
    };
    dispositions.push((descriptor, disposition));
  }

  if !any_work_done {
    info!("everything already up to date, nothing to do");
    return Ok(Outcome::NoWork);
  }

  let report_written = match &lost_report {
    None => {
      store.save(&report)?;
      true
    }
    Some(who) => {
      warn!(
        insertable = %who,
        "dependency tracking unavailable, deleting the build report; the next build must be a full build"
      );
      store.delete()?;
      false
    }
  };

  modules::cache_module_outputs(&report, config)?;
  marker::write_marker(&temporary_rom)?;
  publish(&temporary_rom, &config.output_rom)?;
  gfx::link_rom_graphics(config, false)?;
  gfx::link_rom_graphics(config, true)?;
  std::fs::remove_dir_all(&temporary_folder)?;

  info!("quick build finished successfully");
  Ok(Outcome::Success(RunSummary {
    dispositions,
    report_written,
  }))
}

/// Replace the output ROM with the finished temporary ROM, by rename when
/// the filesystem allows it.
fn publish(temporary_rom: &Path, output_rom: &Path) -> Result<(), EngineError> {
  if std::fs::rename(temporary_rom, output_rom).is_err() {
    std::fs::copy(temporary_rom, output_rom)?;
    std::fs::remove_file(temporary_rom)?;
  }
  Ok(())
}

fn module_source(config: &Configuration, descriptor: &Descriptor) -> Result<std::path::PathBuf, EngineError> {
  let name = descriptor.name.as_deref().ok_or_else(|| {
    EngineError::Insertion("module build order entry carries no source path".to_string())
  })?;
  let path = Path::new(name);
  Ok(if path.is_absolute() {
    path.to_path_buf()
  } else {
    config.project_root.join(path)
  })
}

fn module_outputs_for(
  report: &crate::report::BuildReport,
  config: &Configuration,
  descriptor: &Descriptor,
) -> Vec<std::path::PathBuf> {
  let Some(name) = descriptor.name.as_deref() else {
    return Vec::new();
  };
  if let Ok(resolved) = module_source(config, descriptor) {
    if let Some(outputs) = report.module_outputs.get(&resolved) {
      return outputs.clone();
    }
  }
  report
    .module_outputs
    .get(Path::new(name))
    .cloned()
    .unwrap_or_default()
}
