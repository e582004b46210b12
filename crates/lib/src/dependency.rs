//! Typed dependency records.
//!
//! Every entry of the build report carries the configuration values and
//! filesystem resources its last insertion depended on. The policy attached
//! to each record decides how a violation is handled: a changed `Rebuild`
//! dependency invalidates the whole ROM, a changed `Reinsert` dependency
//! only re-runs the owning insertable.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// What a violated dependency forces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
  #[serde(rename = "REBUILD")]
  Rebuild,
  #[serde(rename = "REINSERT")]
  Reinsert,
}

/// A configuration value observed at last build.
///
/// `config_keys` is a dotted path naming a leaf of the configuration tree,
/// e.g. `rom_size` or `paths.levels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationDependency {
  pub config_keys: String,
  pub value: serde_json::Value,
  pub policy: Policy,
}

impl ConfigurationDependency {
  pub fn new(config_keys: impl Into<String>, value: serde_json::Value, policy: Policy) -> Self {
    Self {
      config_keys: config_keys.into(),
      value,
      policy,
    }
  }
}

/// A file observed at last build, identified by path.
///
/// `last_write_time` is the filesystem timestamp in nanoseconds since the
/// Unix epoch, `None` iff the file did not exist at observation time. The
/// engine compares raw integers and does not normalize across filesystems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDependency {
  pub dependent_path: PathBuf,
  pub last_write_time: Option<u64>,
  pub policy: Policy,
}

// Keyed by path only so a set of dependencies deduplicates records for the
// same file coming from different insertables.
impl PartialEq for ResourceDependency {
  fn eq(&self, other: &Self) -> bool {
    self.dependent_path == other.dependent_path
  }
}

impl Eq for ResourceDependency {}

impl std::hash::Hash for ResourceDependency {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.dependent_path.hash(state);
  }
}

impl ResourceDependency {
  /// Observe `path` right now.
  pub fn observe(path: impl Into<PathBuf>, policy: Policy) -> Self {
    let dependent_path = path.into();
    let last_write_time = last_write_time(&dependent_path);
    Self {
      dependent_path,
      last_write_time,
      policy,
    }
  }

  /// True when the recorded timestamp still matches the filesystem.
  pub fn is_unchanged(&self) -> bool {
    last_write_time(&self.dependent_path) == self.last_write_time
  }
}

/// Current write timestamp of `path`, `None` when the file does not exist.
pub fn last_write_time(path: &Path) -> Option<u64> {
  let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
  modified
    .duration_since(UNIX_EPOCH)
    .ok()
    .map(|d| d.as_nanos() as u64)
}

/// Observe every file under `root` (or `root` itself when it is a file or
/// does not exist) as a dependency with the given policy.
///
/// The root directory itself is included so that added or removed children
/// bump a recorded timestamp on platforms that update directory mtimes.
pub fn observe_tree(root: &Path, policy: Policy) -> HashSet<ResourceDependency> {
  let mut dependencies = HashSet::new();

  if !root.is_dir() {
    dependencies.insert(ResourceDependency::observe(root, policy));
    return dependencies;
  }

  for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
    dependencies.insert(ResourceDependency::observe(entry.path(), policy));
  }

  dependencies
}
