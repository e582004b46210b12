//! Graphics folder linking.
//!
//! The ROM editor expects `Graphics`/`ExGraphics` folders next to the ROM it
//! operates on. After publishing, the project's graphics folders are linked
//! to the output ROM's sidecar folders; a symlink where the platform allows
//! it, a plain copy otherwise.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::Configuration;
use crate::error::EngineError;

const GFX_FOLDER: &str = "Graphics";
const EXGFX_FOLDER: &str = "ExGraphics";

/// Link one project graphics folder to the output ROM's sidecar folder.
pub fn link_rom_graphics(config: &Configuration, exgfx: bool) -> Result<(), EngineError> {
  let source = if exgfx {
    config.ex_graphics_dir()
  } else {
    config.graphics_dir()
  };
  let folder_name = if exgfx { EXGFX_FOLDER } else { GFX_FOLDER };

  let rom_dir = config
    .output_rom
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_else(|| PathBuf::from("."));
  let target = rom_dir.join(folder_name);

  if !source.exists() || source == target {
    return Ok(());
  }

  remove_existing(&target)?;
  if symlink_dir(&source, &target).is_err() {
    copy_dir(&source, &target)?;
  }

  debug!(source = %source.display(), target = %target.display(), "graphics folder linked");
  Ok(())
}

fn remove_existing(target: &Path) -> Result<(), EngineError> {
  if target.symlink_metadata().is_err() {
    return Ok(());
  }
  if target.is_dir() && !target.symlink_metadata()?.file_type().is_symlink() {
    std::fs::remove_dir_all(target)?;
  } else {
    std::fs::remove_file(target)?;
  }
  Ok(())
}

#[cfg(unix)]
fn symlink_dir(source: &Path, target: &Path) -> std::io::Result<()> {
  std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn symlink_dir(source: &Path, target: &Path) -> std::io::Result<()> {
  std::os::windows::fs::symlink_dir(source, target)
}

fn copy_dir(source: &Path, target: &Path) -> Result<(), EngineError> {
  for entry in WalkDir::new(source).into_iter().filter_map(|e| e.ok()) {
    let relative = entry
      .path()
      .strip_prefix(source)
      .unwrap_or_else(|_| Path::new(""));
    let destination = target.join(relative);
    if entry.file_type().is_dir() {
      std::fs::create_dir_all(&destination)?;
    } else {
      if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
      }
      std::fs::copy(entry.path(), &destination)?;
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{ProjectPaths, Tools};
  use crate::descriptor::{Descriptor, Symbol};
  use tempfile::TempDir;

  fn test_config(root: &Path) -> Configuration {
    Configuration {
      project_root: root.to_path_buf(),
      output_rom: root.join("out/hack.sfc"),
      temporary_folder: None,
      rom_size: None,
      paths: ProjectPaths::default(),
      tools: Tools::default(),
      build_order: vec![Descriptor::new(Symbol::Graphics)],
    }
  }

  #[test]
  fn links_graphics_next_to_output_rom() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());

    std::fs::create_dir_all(temp.path().join("Graphics")).unwrap();
    std::fs::write(temp.path().join("Graphics/GFX00.bin"), b"gfx").unwrap();
    std::fs::create_dir_all(temp.path().join("out")).unwrap();

    link_rom_graphics(&config, false).unwrap();

    let linked = temp.path().join("out/Graphics/GFX00.bin");
    assert_eq!(std::fs::read(linked).unwrap(), b"gfx");
  }

  #[test]
  fn missing_source_folder_is_a_noop() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    std::fs::create_dir_all(temp.path().join("out")).unwrap();

    link_rom_graphics(&config, true).unwrap();
    assert!(!temp.path().join("out/ExGraphics").exists());
  }

  #[test]
  fn relinks_over_existing_target() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());

    std::fs::create_dir_all(temp.path().join("ExGraphics")).unwrap();
    std::fs::write(temp.path().join("ExGraphics/ExGFX80.bin"), b"new").unwrap();
    std::fs::create_dir_all(temp.path().join("out/ExGraphics")).unwrap();
    std::fs::write(temp.path().join("out/ExGraphics/stale.bin"), b"old").unwrap();

    link_rom_graphics(&config, true).unwrap();

    assert!(temp.path().join("out/ExGraphics/ExGFX80.bin").exists());
    assert!(!temp.path().join("out/ExGraphics/stale.bin").exists());
  }
}
