//! The build report: the persisted manifest of the last successful build.
//!
//! A report records, per build-order entry, everything the insertion
//! depended on, plus the global facts a quick build must re-check (ROM
//! size, inserted levels, module outputs). It is created by the full-build
//! path, mutated in place during a successful quick build, and rewritten
//! atomically at commit.

mod store;

pub use store::{ReportError, ReportStore};

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::BUILD_REPORT_VERSION;
use crate::dependency::{ConfigurationDependency, ResourceDependency};
use crate::descriptor::Descriptor;
use crate::hijacks::Hijack;

/// One build-order position's recorded dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
  pub descriptor: Descriptor,
  pub configuration_dependencies: Vec<ConfigurationDependency>,
  pub resource_dependencies: Vec<ResourceDependency>,
  /// Present iff the descriptor is a patch.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hijacks: Option<Vec<Hijack>>,
}

impl Entry {
  pub fn new(descriptor: Descriptor) -> Self {
    Self {
      descriptor,
      configuration_dependencies: Vec::new(),
      resource_dependencies: Vec::new(),
      hijacks: None,
    }
  }
}

/// Manifest of the last successful build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
  pub file_format_version: u32,
  pub build_order: Vec<Descriptor>,
  pub rom_size: Option<u64>,
  /// Parallel to `build_order`: same length, same descriptors in the same
  /// positions.
  pub dependencies: Vec<Entry>,
  /// Every level number the last build inserted.
  pub inserted_levels: BTreeSet<u16>,
  /// Files each module's last assembly produced, keyed by module source.
  pub module_outputs: BTreeMap<PathBuf, Vec<PathBuf>>,
}

impl BuildReport {
  /// An empty report for the given build order, at the current format
  /// version, with one blank entry per descriptor.
  pub fn for_build_order(build_order: Vec<Descriptor>, rom_size: Option<u64>) -> Self {
    let dependencies = build_order.iter().cloned().map(Entry::new).collect();
    Self {
      file_format_version: BUILD_REPORT_VERSION,
      build_order,
      rom_size,
      dependencies,
      inserted_levels: BTreeSet::new(),
      module_outputs: BTreeMap::new(),
    }
  }

  /// Check the parallel-array invariant.
  pub fn is_consistent(&self) -> bool {
    self.build_order.len() == self.dependencies.len()
      && self
        .build_order
        .iter()
        .zip(&self.dependencies)
        .all(|(descriptor, entry)| *descriptor == entry.descriptor)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dependency::Policy;
  use crate::descriptor::Symbol;

  #[test]
  fn blank_report_is_consistent() {
    let order = vec![
      Descriptor::new(Symbol::Graphics),
      Descriptor::named(Symbol::Patch, "p.asm"),
    ];
    let report = BuildReport::for_build_order(order, Some(4 * 1024 * 1024));
    assert!(report.is_consistent());
    assert_eq!(report.file_format_version, BUILD_REPORT_VERSION);
    assert_eq!(report.dependencies.len(), 2);
  }

  #[test]
  fn mismatched_descriptor_breaks_consistency() {
    let mut report = BuildReport::for_build_order(vec![Descriptor::new(Symbol::Graphics)], None);
    report.dependencies[0].descriptor = Descriptor::new(Symbol::Levels);
    assert!(!report.is_consistent());
  }

  #[test]
  fn hijacks_are_omitted_when_absent() {
    let entry = Entry::new(Descriptor::new(Symbol::Graphics));
    let json = serde_json::to_value(&entry).unwrap();
    assert!(json.get("hijacks").is_none());
  }

  #[test]
  fn report_roundtrips_through_json() {
    let mut report = BuildReport::for_build_order(
      vec![Descriptor::named(Symbol::Patch, "patches/foo.asm")],
      Some(1024),
    );
    report.dependencies[0].hijacks = Some(vec![Hijack::new(0x108000, 16)]);
    report.dependencies[0].configuration_dependencies.push(
      ConfigurationDependency::new("rom_size", serde_json::json!(1024), Policy::Rebuild),
    );
    report.dependencies[0]
      .resource_dependencies
      .push(ResourceDependency {
        dependent_path: PathBuf::from("patches/foo.asm"),
        last_write_time: Some(1000),
        policy: Policy::Reinsert,
      });
    report.inserted_levels.insert(0x105);
    report
      .module_outputs
      .insert(PathBuf::from("modules/m.asm"), vec![PathBuf::from("modules/m.sym")]);

    let json = serde_json::to_string_pretty(&report).unwrap();
    let back: BuildReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
    assert!(back.is_consistent());
  }
}
