//! Assembler binding.
//!
//! The engine treats the patch assembler as a black box that applies an asm
//! source to an unheadered ROM image. It is a process-wide resource: its
//! availability is validated once, before first use, and every patching
//! call goes through the same handle.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::consts::MAX_ROM_SIZE;
use crate::error::EngineError;

/// Applies asm patches to in-memory ROM images.
pub trait Assembler {
  /// Validate the assembler is usable. Must succeed before the first
  /// [`apply`](Assembler::apply); fails with `ToolNotFound` otherwise.
  fn ensure_init(&self) -> Result<(), EngineError>;

  /// Apply `patch` to the unheadered image in `rom`, growing it up to
  /// `max_size`. When `symbols_out` is given, a symbols listing is written
  /// there. Returns `false` when the patch did not apply cleanly.
  fn apply(
    &self,
    patch: &Path,
    rom: &mut Vec<u8>,
    max_size: usize,
    symbols_out: Option<&Path>,
  ) -> Result<bool, EngineError>;
}

/// Binding to an external assembler executable.
#[derive(Debug)]
pub struct AsarTool {
  executable: PathBuf,
  init: OnceLock<bool>,
}

impl AsarTool {
  pub fn new(executable: PathBuf) -> Self {
    Self {
      executable,
      init: OnceLock::new(),
    }
  }
}

impl Assembler for AsarTool {
  fn ensure_init(&self) -> Result<(), EngineError> {
    let available = *self.init.get_or_init(|| self.executable.is_file());
    if available {
      Ok(())
    } else {
      Err(EngineError::ToolNotFound(format!(
        "assembler executable not found at '{}'",
        self.executable.display()
      )))
    }
  }

  fn apply(
    &self,
    patch: &Path,
    rom: &mut Vec<u8>,
    max_size: usize,
    symbols_out: Option<&Path>,
  ) -> Result<bool, EngineError> {
    self.ensure_init()?;

    let mut scratch = tempfile::Builder::new()
      .prefix("romforge-")
      .suffix(".sfc")
      .tempfile()?;
    scratch.write_all(rom)?;
    scratch.flush()?;

    let mut command = Command::new(&self.executable);
    if let Some(symbols_path) = symbols_out {
      command.arg("--symbols=wla");
      command.arg(format!("--symbols-path={}", symbols_path.display()));
    }
    command.arg(patch);
    command.arg(scratch.path());

    debug!(patch = %patch.display(), "running assembler");
    let output = command.output()?;

    if !output.status.success() {
      warn!(
        patch = %patch.display(),
        stderr = %String::from_utf8_lossy(&output.stderr),
        "assembler reported errors"
      );
      return Ok(false);
    }

    let patched = std::fs::read(scratch.path())?;
    if patched.len() > max_size {
      return Err(EngineError::Insertion(format!(
        "patch '{}' grew the ROM beyond the {} byte cap",
        patch.display(),
        max_size
      )));
    }

    *rom = patched;
    Ok(true)
  }
}

/// Default max-size cap used by callers that have no tighter bound.
pub fn default_size_cap() -> usize {
  MAX_ROM_SIZE
}
