//! Level file conventions.
//!
//! Exported levels live as `*.mwl` files in the configured levels folder.
//! The internal level number is the trailing hexadecimal token of the file
//! stem: both `105.mwl` and `level 105.mwl` name level `0x105`. Numbers
//! above [`MAX_LEVEL_NUMBER`](crate::consts::MAX_LEVEL_NUMBER) are invalid.

use std::collections::BTreeSet;
use std::path::Path;

use crate::consts::MAX_LEVEL_NUMBER;
use crate::error::EngineError;

pub const LEVEL_EXTENSION: &str = "mwl";

/// Extract the internal level number from a level file name.
pub fn internal_level_number(path: &Path) -> Result<u16, EngineError> {
  let stem = path
    .file_stem()
    .and_then(|s| s.to_str())
    .ok_or_else(|| bad_level_name(path))?;

  let token = stem.rsplit(|c: char| c.is_whitespace()).next().unwrap_or(stem);
  let number = u16::from_str_radix(token, 16).map_err(|_| bad_level_name(path))?;

  if number > MAX_LEVEL_NUMBER {
    return Err(bad_level_name(path));
  }
  Ok(number)
}

fn bad_level_name(path: &Path) -> EngineError {
  EngineError::Insertion(format!(
    "failed to determine the level number of level file '{}'",
    path.display()
  ))
}

/// Level numbers of every `.mwl` file in `levels_dir`.
pub fn scan_level_numbers(levels_dir: &Path) -> Result<BTreeSet<u16>, EngineError> {
  let mut numbers = BTreeSet::new();
  for entry in std::fs::read_dir(levels_dir)? {
    let path = entry?.path();
    if path.extension().and_then(|e| e.to_str()) == Some(LEVEL_EXTENSION) {
      numbers.insert(internal_level_number(&path)?);
    }
  }
  Ok(numbers)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn parses_bare_hex_stem() {
    assert_eq!(internal_level_number(Path::new("105.mwl")).unwrap(), 0x105);
    assert_eq!(internal_level_number(Path::new("C7.mwl")).unwrap(), 0xC7);
  }

  #[test]
  fn parses_trailing_token() {
    assert_eq!(internal_level_number(Path::new("level 105.mwl")).unwrap(), 0x105);
    assert_eq!(internal_level_number(Path::new("my level 01F.mwl")).unwrap(), 0x1F);
  }

  #[test]
  fn rejects_non_hex_names() {
    assert!(internal_level_number(Path::new("intro.mwl")).is_err());
  }

  #[test]
  fn rejects_out_of_range_numbers() {
    assert!(internal_level_number(Path::new("200.mwl")).is_err());
    assert!(internal_level_number(Path::new("1FF.mwl")).is_ok());
  }

  #[test]
  fn scan_collects_only_mwl_files() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("105.mwl"), b"").unwrap();
    std::fs::write(temp.path().join("level 106.mwl"), b"").unwrap();
    std::fs::write(temp.path().join("notes.txt"), b"").unwrap();

    let numbers = scan_level_numbers(temp.path()).unwrap();
    assert_eq!(numbers, BTreeSet::from([0x105, 0x106]));
  }

  #[test]
  fn scan_surfaces_unparseable_names() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("broken name.mwl"), b"").unwrap();
    assert!(matches!(
      scan_level_numbers(temp.path()),
      Err(EngineError::Insertion(_))
    ));
  }
}
