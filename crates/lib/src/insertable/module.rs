//! The module insertable.
//!
//! A module is a dynamically-assembled code unit. Inserting one assembles
//! its source into the temporary ROM, derives the addresses it claimed from
//! the image diff, persists those addresses as the module's cleanup file
//! (so a later build can undo the writes), and emits a symbols sidecar next
//! to the source as the module's recorded output.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::info;

use super::{resolve_name_path, Insertable, InsertionContext};
use crate::assembler::Assembler;
use crate::config::Configuration;
use crate::consts::{BANK_SIZE, MAX_ROM_SIZE};
use crate::dependency::{ConfigurationDependency, Policy, ResourceDependency};
use crate::error::EngineError;
use crate::hijacks::diff_written_ranges;
use crate::modules::write_cleanup_file;

pub struct ModuleInsertable<'a> {
  source: PathBuf,
  temporary_rom: PathBuf,
  assembler: &'a dyn Assembler,
  config: &'a Configuration,
  config_dependencies: Vec<ConfigurationDependency>,
}

impl<'a> ModuleInsertable<'a> {
  pub fn new(name: &str, ctx: &InsertionContext<'a>) -> Self {
    Self {
      source: resolve_name_path(ctx.config, name),
      temporary_rom: ctx.temporary_rom.to_path_buf(),
      assembler: ctx.assembler,
      config: ctx.config,
      config_dependencies: vec![
        ConfigurationDependency::new(
          "tools.assembler",
          ctx.config.value_by_key("tools.assembler"),
          Policy::Rebuild,
        ),
        ConfigurationDependency::new(
          "paths.modules",
          ctx.config.value_by_key("paths.modules"),
          Policy::Rebuild,
        ),
      ],
    }
  }

  /// Where this module's symbols sidecar is written.
  pub fn symbols_output(&self) -> PathBuf {
    self.source.with_extension("sym")
  }

  fn assemble(&mut self) -> Result<(), EngineError> {
    info!(module = %self.source.display(), "assembling module");

    let rom_bytes = std::fs::read(&self.temporary_rom)?;
    let header_size = rom_bytes.len() % BANK_SIZE;
    let (header, body) = rom_bytes.split_at(header_size);
    let before = body.to_vec();
    let mut body = body.to_vec();

    let symbols = self.symbols_output();
    let assembled = self
      .assembler
      .apply(&self.source, &mut body, MAX_ROM_SIZE, Some(symbols.as_path()))?;
    if !assembled {
      return Err(EngineError::Insertion(format!(
        "failed to assemble module '{}'",
        self.source.display()
      )));
    }

    let claimed: Vec<u32> = diff_written_ranges(&before, &body)
      .iter()
      .map(|range| pc_to_snes(range.address))
      .collect();
    write_cleanup_file(self.config, &self.source, &claimed)?;

    let mut output = Vec::with_capacity(header.len() + body.len());
    output.extend_from_slice(header);
    output.extend_from_slice(&body);
    std::fs::write(&self.temporary_rom, output)?;
    Ok(())
  }
}

impl Insertable for ModuleInsertable<'_> {
  fn init(&mut self) -> Result<(), EngineError> {
    self.assembler.ensure_init()?;
    if !self.source.is_file() {
      return Err(EngineError::ResourceNotFound(format!(
        "module source not found at '{}'",
        self.source.display()
      )));
    }
    Ok(())
  }

  fn insert(&mut self) -> Result<(), EngineError> {
    self.assemble()
  }

  fn insert_with_dependencies(&mut self) -> Result<HashSet<ResourceDependency>, EngineError> {
    self.assemble()?;

    let mut dependencies = HashSet::new();
    dependencies.insert(ResourceDependency::observe(&self.source, Policy::Reinsert));
    Ok(dependencies)
  }

  fn configuration_dependencies(&self) -> Vec<ConfigurationDependency> {
    self.config_dependencies.clone()
  }
}

/// LoROM file offset to SNES address.
fn pc_to_snes(pc: u32) -> u32 {
  ((pc << 1) & 0x7F_0000) | (pc & 0x7FFF) | 0x8000
}
