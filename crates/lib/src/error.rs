//! Engine-wide error type.
//!
//! `MustRebuild` is not a failure: it is the engine's request that the caller
//! run the full-build path instead. It propagates internally like any other
//! error so checks can bail out with `?`, and the quick-build driver converts
//! it into [`crate::quick::Outcome::MustRebuild`] at its boundary. Everything
//! else terminates the run and is surfaced to the user.

use thiserror::Error;

use crate::config::ConfigError;
use crate::report::ReportError;

/// Errors raised by the build engine.
#[derive(Debug, Error)]
pub enum EngineError {
  /// Incremental reuse is unsafe or impossible; the caller must run a full
  /// build. A mode switch, not a failure.
  #[error("{0}, must rebuild")]
  MustRebuild(String),

  /// A resource-level invariant was violated; fatal to this run.
  #[error("insertion failed: {0}")]
  Insertion(String),

  /// An external tool (assembler, editor) is unavailable; fatal.
  #[error("tool not found: {0}")]
  ToolNotFound(String),

  /// An expected input file is missing; fatal.
  #[error("resource not found: {0}")]
  ResourceNotFound(String),

  /// An insertable cannot describe its inputs. Recoverable within the run:
  /// later reinsertions skip dependency bookkeeping and the report is
  /// deleted at commit.
  #[error("{0} did not produce a dependency report")]
  NoDependencyReport(String),

  /// Build report storage failed.
  #[error("build report error: {0}")]
  Report(#[from] ReportError),

  /// Configuration error.
  #[error("configuration error: {0}")]
  Config(#[from] ConfigError),

  /// I/O error outside the storage layers.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl EngineError {
  /// True for the `MustRebuild` mode switch.
  pub fn is_rebuild_signal(&self) -> bool {
    matches!(self, EngineError::MustRebuild(_))
  }
}
