//! Module cleanup and module-output caching.
//!
//! A module's prior writes must be undone before it is re-assembled: its
//! cleanup file lists every address the last assembly claimed, and an
//! `autoclean` patch generated from that list hands those regions back to
//! the assembler. Module outputs (symbol sidecars) are mirrored into the
//! old-symbols directory after each build so unchanged modules can be
//! restored without re-assembling.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::assembler::Assembler;
use crate::config::Configuration;
use crate::consts::{BANK_SIZE, MAX_ROM_SIZE};
use crate::error::EngineError;
use crate::paths::{module_cleanup_file, old_symbols_dir};
use crate::report::BuildReport;

/// Undo a module's previous writes on the temporary ROM.
///
/// Reads the module's cleanup file, emits one `autoclean $XXXXXX` directive
/// per address, and runs the assembler over the unheadered image. A missing
/// cleanup file or a failed patch makes incremental reuse unsafe.
pub fn clean_module(
  assembler: &dyn Assembler,
  module_source: &Path,
  temporary_rom: &Path,
  config: &Configuration,
) -> Result<(), EngineError> {
  let cleanup_path = module_cleanup_file(&config.project_root, &config.modules_dir(), module_source);
  if !cleanup_path.exists() {
    return Err(EngineError::MustRebuild(format!(
      "cannot clean module '{}', its cleanup file is missing",
      module_source.display()
    )));
  }

  let mut patch = tempfile::Builder::new()
    .prefix("romforge-clean-")
    .suffix(".asm")
    .tempfile()?;
  for line in std::fs::read_to_string(&cleanup_path)?.lines() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    let address: u32 = line.parse().map_err(|_| {
      EngineError::MustRebuild(format!(
        "cleanup file '{}' contains an unreadable address",
        cleanup_path.display()
      ))
    })?;
    writeln!(patch, "autoclean ${:06X}", address)?;
  }
  patch.flush()?;

  let rom_bytes = std::fs::read(temporary_rom)?;
  let header_size = rom_bytes.len() % BANK_SIZE;
  let (header, body) = rom_bytes.split_at(header_size);
  let mut body = body.to_vec();

  let cleaned = assembler.apply(patch.path(), &mut body, MAX_ROM_SIZE, None)?;
  if !cleaned {
    return Err(EngineError::MustRebuild(format!(
      "failed to clean module '{}'",
      module_source.display()
    )));
  }

  let mut output = Vec::with_capacity(header.len() + body.len());
  output.extend_from_slice(header);
  output.extend_from_slice(&body);
  std::fs::write(temporary_rom, output)?;

  debug!(module = %module_source.display(), "module cleaned");
  Ok(())
}

/// Write a module's cleanup file, one decimal address per line.
pub fn write_cleanup_file(
  config: &Configuration,
  module_source: &Path,
  addresses: &[u32],
) -> Result<(), EngineError> {
  let cleanup_path = module_cleanup_file(&config.project_root, &config.modules_dir(), module_source);
  if let Some(parent) = cleanup_path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  let mut content = String::new();
  for address in addresses {
    content.push_str(&address.to_string());
    content.push('\n');
  }
  std::fs::write(&cleanup_path, content)?;
  Ok(())
}

/// Copy an unchanged module's previous outputs back into place from the
/// old-symbols directory.
pub fn restore_module_outputs(
  outputs: &[PathBuf],
  config: &Configuration,
) -> Result<(), EngineError> {
  let modules_dir = config.modules_dir();
  let cache_root = old_symbols_dir(&config.project_root);

  for output in outputs {
    let relative = output.strip_prefix(&modules_dir).unwrap_or(output);
    let source = cache_root.join(relative);

    if !source.exists() {
      return Err(EngineError::MustRebuild(format!(
        "previously created module output '{}' is missing",
        source.display()
      )));
    }

    let target = modules_dir.join(relative);
    if let Some(parent) = target.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(&source, &target)?;
    debug!(output = %target.display(), "module output restored");
  }

  Ok(())
}

/// Snapshot the current module outputs into the old-symbols directory.
pub fn cache_module_outputs(report: &BuildReport, config: &Configuration) -> Result<(), EngineError> {
  let modules_dir = config.modules_dir();
  let cache_root = old_symbols_dir(&config.project_root);

  for (module, outputs) in &report.module_outputs {
    for output in outputs {
      let relative = output.strip_prefix(&modules_dir).unwrap_or(output);
      let source = modules_dir.join(relative);

      if !source.exists() {
        return Err(EngineError::MustRebuild(format!(
          "output '{}' of module '{}' is missing",
          source.display(),
          module.display()
        )));
      }

      let target = cache_root.join(relative);
      if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
      }
      std::fs::copy(&source, &target)?;
    }
  }

  if !report.module_outputs.is_empty() {
    info!(modules = report.module_outputs.len(), "module outputs cached");
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{ProjectPaths, Tools};
  use crate::descriptor::{Descriptor, Symbol};
  use tempfile::TempDir;

  struct RecordingAssembler {
    expected_directives: Vec<String>,
  }

  impl Assembler for RecordingAssembler {
    fn ensure_init(&self) -> Result<(), EngineError> {
      Ok(())
    }

    fn apply(
      &self,
      patch: &Path,
      rom: &mut Vec<u8>,
      _max_size: usize,
      _symbols_out: Option<&Path>,
    ) -> Result<bool, EngineError> {
      let content = std::fs::read_to_string(patch).unwrap();
      let lines: Vec<_> = content.lines().map(str::to_string).collect();
      assert_eq!(lines, self.expected_directives);
      // Mark the body so the caller's write-back is observable.
      rom[0] = 0xEA;
      Ok(true)
    }
  }

  struct RefusingAssembler;

  impl Assembler for RefusingAssembler {
    fn ensure_init(&self) -> Result<(), EngineError> {
      Ok(())
    }

    fn apply(&self, _: &Path, _: &mut Vec<u8>, _: usize, _: Option<&Path>) -> Result<bool, EngineError> {
      Ok(false)
    }
  }

  fn test_config(root: &Path) -> Configuration {
    Configuration {
      project_root: root.to_path_buf(),
      output_rom: root.join("hack.sfc"),
      temporary_folder: None,
      rom_size: None,
      paths: ProjectPaths::default(),
      tools: Tools::default(),
      build_order: vec![Descriptor::named(Symbol::Module, "modules/m.asm")],
    }
  }

  #[test]
  fn clean_emits_autoclean_directives_and_writes_back() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());

    let module = config.modules_dir().join("m.asm");
    write_cleanup_file(&config, &module, &[0x108000, 0x10FF00]).unwrap();

    let rom = temp.path().join("temp.sfc");
    std::fs::write(&rom, vec![0u8; 2 * BANK_SIZE]).unwrap();

    let assembler = RecordingAssembler {
      expected_directives: vec!["autoclean $108000".to_string(), "autoclean $10FF00".to_string()],
    };
    clean_module(&assembler, &module, &rom, &config).unwrap();

    let bytes = std::fs::read(&rom).unwrap();
    assert_eq!(bytes[0], 0xEA);
  }

  #[test]
  fn clean_preserves_copier_header() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());

    let module = config.modules_dir().join("m.asm");
    write_cleanup_file(&config, &module, &[0x8000]).unwrap();

    let rom = temp.path().join("temp.smc");
    let mut image = vec![0xAAu8; 512];
    image.extend(vec![0u8; 2 * BANK_SIZE]);
    std::fs::write(&rom, image).unwrap();

    let assembler = RecordingAssembler {
      expected_directives: vec!["autoclean $008000".to_string()],
    };
    clean_module(&assembler, &module, &rom, &config).unwrap();

    let bytes = std::fs::read(&rom).unwrap();
    assert_eq!(&bytes[..512], vec![0xAAu8; 512].as_slice());
    assert_eq!(bytes[512], 0xEA);
  }

  #[test]
  fn missing_cleanup_file_forces_rebuild() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let rom = temp.path().join("temp.sfc");
    std::fs::write(&rom, vec![0u8; BANK_SIZE]).unwrap();

    let result = clean_module(&RefusingAssembler, &config.modules_dir().join("m.asm"), &rom, &config);
    assert!(matches!(result, Err(EngineError::MustRebuild(_))));
  }

  #[test]
  fn failed_clean_forces_rebuild() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());

    let module = config.modules_dir().join("m.asm");
    write_cleanup_file(&config, &module, &[0x108000]).unwrap();

    let rom = temp.path().join("temp.sfc");
    std::fs::write(&rom, vec![0u8; BANK_SIZE]).unwrap();

    let result = clean_module(&RefusingAssembler, &module, &rom, &config);
    assert!(matches!(result, Err(EngineError::MustRebuild(_))));
  }

  #[test]
  fn cache_and_restore_roundtrip() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let modules_dir = config.modules_dir();
    std::fs::create_dir_all(modules_dir.join("sub")).unwrap();

    let output = modules_dir.join("sub/m.sym");
    std::fs::write(&output, b"labels").unwrap();

    let mut report = BuildReport::for_build_order(config.build_order.clone(), None);
    report
      .module_outputs
      .insert(modules_dir.join("sub/m.asm"), vec![output.clone()]);

    cache_module_outputs(&report, &config).unwrap();
    assert!(old_symbols_dir(temp.path()).join("sub/m.sym").exists());

    // The active copy disappears; restoring brings it back verbatim.
    std::fs::remove_file(&output).unwrap();
    restore_module_outputs(&[output.clone()], &config).unwrap();
    assert_eq!(std::fs::read(&output).unwrap(), b"labels");
  }

  #[test]
  fn restore_with_missing_cache_forces_rebuild() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let output = config.modules_dir().join("m.sym");

    let result = restore_module_outputs(&[output], &config);
    assert!(matches!(result, Err(EngineError::MustRebuild(_))));
  }

  #[test]
  fn cache_with_missing_output_forces_rebuild() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());

    let mut report = BuildReport::for_build_order(config.build_order.clone(), None);
    report.module_outputs.insert(
      config.modules_dir().join("m.asm"),
      vec![config.modules_dir().join("m.sym")],
    );

    let result = cache_module_outputs(&report, &config);
    assert!(matches!(result, Err(EngineError::MustRebuild(_))));
  }
}
