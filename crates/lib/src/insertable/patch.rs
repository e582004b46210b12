//! The patch insertable.
//!
//! Applies one asm patch to the temporary ROM through the assembler and
//! derives its hijacks, the contiguous ranges the patch wrote, by diffing
//! the image before and after application.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::info;

use super::{resolve_name_path, Insertable, InsertionContext};
use crate::assembler::Assembler;
use crate::consts::{BANK_SIZE, MAX_ROM_SIZE};
use crate::dependency::{ConfigurationDependency, Policy, ResourceDependency};
use crate::error::EngineError;
use crate::hijacks::{diff_written_ranges, Hijack};

pub struct PatchInsertable<'a> {
  source: PathBuf,
  temporary_rom: PathBuf,
  assembler: &'a dyn Assembler,
  config_dependencies: Vec<ConfigurationDependency>,
  hijacks: Option<Vec<Hijack>>,
}

impl<'a> PatchInsertable<'a> {
  pub fn new(name: &str, ctx: &InsertionContext<'a>) -> Self {
    Self {
      source: resolve_name_path(ctx.config, name),
      temporary_rom: ctx.temporary_rom.to_path_buf(),
      assembler: ctx.assembler,
      config_dependencies: vec![ConfigurationDependency::new(
        "tools.assembler",
        ctx.config.value_by_key("tools.assembler"),
        Policy::Rebuild,
      )],
      hijacks: None,
    }
  }

  fn apply(&mut self) -> Result<(), EngineError> {
    info!(patch = %self.source.display(), "applying patch");

    let rom_bytes = std::fs::read(&self.temporary_rom)?;
    let header_size = rom_bytes.len() % BANK_SIZE;
    let (header, body) = rom_bytes.split_at(header_size);
    let before = body.to_vec();
    let mut body = body.to_vec();

    let applied = self.assembler.apply(&self.source, &mut body, MAX_ROM_SIZE, None)?;
    if !applied {
      return Err(EngineError::Insertion(format!(
        "failed to apply patch '{}'",
        self.source.display()
      )));
    }

    self.hijacks = Some(diff_written_ranges(&before, &body));

    let mut output = Vec::with_capacity(header.len() + body.len());
    output.extend_from_slice(header);
    output.extend_from_slice(&body);
    std::fs::write(&self.temporary_rom, output)?;
    Ok(())
  }
}

impl Insertable for PatchInsertable<'_> {
  fn init(&mut self) -> Result<(), EngineError> {
    self.assembler.ensure_init()?;
    if !self.source.is_file() {
      return Err(EngineError::ResourceNotFound(format!(
        "patch source not found at '{}'",
        self.source.display()
      )));
    }
    Ok(())
  }

  fn insert(&mut self) -> Result<(), EngineError> {
    self.apply()
  }

  fn insert_with_dependencies(&mut self) -> Result<HashSet<ResourceDependency>, EngineError> {
    self.apply()?;

    let mut dependencies = HashSet::new();
    dependencies.insert(ResourceDependency::observe(&self.source, Policy::Reinsert));
    Ok(dependencies)
  }

  fn configuration_dependencies(&self) -> Vec<ConfigurationDependency> {
    self.config_dependencies.clone()
  }

  fn hijacks(&self) -> Option<Vec<Hijack>> {
    self.hijacks.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{Configuration, ProjectPaths, Tools};
  use crate::descriptor::{Descriptor, Symbol};
  use std::path::Path;
  use tempfile::TempDir;

  struct WritingAssembler;

  impl Assembler for WritingAssembler {
    fn ensure_init(&self) -> Result<(), EngineError> {
      Ok(())
    }

    fn apply(&self, _: &Path, rom: &mut Vec<u8>, _: usize, _: Option<&Path>) -> Result<bool, EngineError> {
      rom[4] = 0xFF;
      rom[5] = 0xFF;
      Ok(true)
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
      build_order: vec![Descriptor::named(Symbol::Patch, "p.asm")],
    }
  }

  #[test]
  fn apply_records_hijacks_and_dependencies() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let rom = temp.path().join("temp.sfc");
    std::fs::write(&rom, vec![0u8; BANK_SIZE]).unwrap();
    std::fs::write(temp.path().join("p.asm"), "org $008000\n").unwrap();

    let assembler = WritingAssembler;
    let ctx = InsertionContext {
      config: &config,
      temporary_rom: &rom,
      assembler: &assembler,
    };

    let mut patch = PatchInsertable::new("p.asm", &ctx);
    patch.init().unwrap();
    let deps = patch.insert_with_dependencies().unwrap();

    assert_eq!(deps.len(), 1);
    assert_eq!(
      deps.iter().next().unwrap().dependent_path,
      temp.path().join("p.asm")
    );
    assert_eq!(patch.hijacks(), Some(vec![Hijack::new(4, 2)]));

    let bytes = std::fs::read(&rom).unwrap();
    assert_eq!(bytes[4], 0xFF);
    assert_eq!(bytes[5], 0xFF);
  }

  #[test]
  fn missing_source_fails_init() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let rom = temp.path().join("temp.sfc");
    let assembler = WritingAssembler;
    let ctx = InsertionContext {
      config: &config,
      temporary_rom: &rom,
      assembler: &assembler,
    };

    let mut patch = PatchInsertable::new("missing.asm", &ctx);
    assert!(matches!(patch.init(), Err(EngineError::ResourceNotFound(_))));
  }
}
