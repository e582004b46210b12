//! Build report persistence.
//!
//! The report lives at `.cache/build_report.json` under the project root.
//! Saves are atomic (write to a temp file, then rename) so a crash can
//! never leave a half-written report behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::BuildReport;
use crate::paths::build_report_path;

/// Errors raised by report storage.
#[derive(Debug, Error)]
pub enum ReportError {
  #[error("failed to create report directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to read build report: {0}")]
  Read(#[source] io::Error),

  #[error("failed to parse build report: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize build report: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write build report: {0}")]
  Write(#[source] io::Error),
}

/// Reads and writes the build report of one project.
#[derive(Debug, Clone)]
pub struct ReportStore {
  path: PathBuf,
}

impl ReportStore {
  /// Store for the report of the project rooted at `project_root`.
  pub fn for_project(project_root: &Path) -> Self {
    Self {
      path: build_report_path(project_root),
    }
  }

  /// Store reading and writing an explicit path.
  pub fn at_path(path: PathBuf) -> Self {
    Self { path }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Load the report. `Ok(None)` when no report exists.
  pub fn load(&self) -> Result<Option<BuildReport>, ReportError> {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(ReportError::Read(e)),
    };

    let report: BuildReport = serde_json::from_str(&content).map_err(ReportError::Parse)?;
    Ok(Some(report))
  }

  /// Persist the report atomically.
  pub fn save(&self, report: &BuildReport) -> Result<(), ReportError> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent).map_err(ReportError::CreateDir)?;
    }

    let temp_path = self.path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(report).map_err(ReportError::Serialize)?;
    fs::write(&temp_path, &content).map_err(ReportError::Write)?;
    fs::rename(&temp_path, &self.path).map_err(ReportError::Write)?;

    debug!(path = %self.path.display(), "build report saved");
    Ok(())
  }

  /// Delete the report. Succeeds when none exists.
  pub fn delete(&self) -> Result<(), ReportError> {
    match fs::remove_file(&self.path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(ReportError::Write(e)),
    }
  }
}
