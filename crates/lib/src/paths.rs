//! Well-known locations under the project root.
//!
//! Everything the engine persists between builds lives under `.cache/` so a
//! project checkout can be cleaned by deleting a single folder.

use std::path::{Path, PathBuf};

const CACHE_DIR: &str = ".cache";
const BUILD_REPORT_FILENAME: &str = "build_report.json";
const CLEANUP_DIR: &str = "cleanup";
const MODULE_SYMBOLS_DIR: &str = "module_symbols";

/// `.cache/` under the project root.
pub fn cache_dir(project_root: &Path) -> PathBuf {
  project_root.join(CACHE_DIR)
}

/// The persisted build report.
pub fn build_report_path(project_root: &Path) -> PathBuf {
  cache_dir(project_root).join(BUILD_REPORT_FILENAME)
}

/// Root of the per-module cleanup files.
pub fn cleanup_dir(project_root: &Path) -> PathBuf {
  cache_dir(project_root).join(CLEANUP_DIR)
}

/// Mirror tree holding the previous build's module outputs.
pub fn old_symbols_dir(project_root: &Path) -> PathBuf {
  cache_dir(project_root).join(MODULE_SYMBOLS_DIR)
}

/// Cleanup file of a module, mirroring the module's path relative to the
/// modules root with an `.addr` extension.
pub fn module_cleanup_file(project_root: &Path, modules_dir: &Path, module_source: &Path) -> PathBuf {
  let relative = module_source.strip_prefix(modules_dir).unwrap_or(module_source);
  cleanup_dir(project_root).join(relative.with_extension("addr"))
}

/// Where the previous output ROM is copied for in-place mutation.
pub fn temporary_rom_path(temporary_folder: &Path, output_rom: &Path) -> PathBuf {
  let name = output_rom.file_name().unwrap_or_else(|| "rom.sfc".as_ref());
  temporary_folder.join(name)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn report_lives_under_cache() {
    let path = build_report_path(Path::new("/proj"));
    assert_eq!(path, Path::new("/proj/.cache/build_report.json"));
  }

  #[test]
  fn cleanup_file_mirrors_module_tree() {
    let path = module_cleanup_file(
      Path::new("/proj"),
      Path::new("/proj/modules"),
      Path::new("/proj/modules/sub/m.asm"),
    );
    assert_eq!(path, Path::new("/proj/.cache/cleanup/sub/m.addr"));
  }

  #[test]
  fn temporary_rom_keeps_output_filename() {
    let path = temporary_rom_path(Path::new("/tmp/build"), Path::new("/proj/hack.sfc"));
    assert_eq!(path, Path::new("/tmp/build/hack.sfc"));
  }
}
