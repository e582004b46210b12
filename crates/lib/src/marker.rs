//! Builder marker.
//!
//! Before the temporary ROM is published, a short fixed byte sequence is
//! written at a fixed unheadered offset so other tooling can recognize
//! images produced by this builder.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::consts::{BANK_SIZE, ROM_MARKER, ROM_MARKER_OFFSET};
use crate::error::EngineError;

/// Stamp `rom_path` with the builder marker.
pub fn write_marker(rom_path: &Path) -> Result<(), EngineError> {
  let mut file = std::fs::OpenOptions::new().read(true).write(true).open(rom_path)?;
  let size = file.metadata()?.len() as usize;
  let header_size = size % BANK_SIZE;
  let offset = header_size + ROM_MARKER_OFFSET;

  if offset + ROM_MARKER.len() > size {
    return Err(EngineError::Insertion(format!(
      "ROM at '{}' is too small to carry the builder marker",
      rom_path.display()
    )));
  }

  file.seek(SeekFrom::Start(offset as u64))?;
  file.write_all(ROM_MARKER)?;
  Ok(())
}

/// True when `rom_path` carries the builder marker.
pub fn has_marker(rom_path: &Path) -> Result<bool, EngineError> {
  let mut file = std::fs::File::open(rom_path)?;
  let size = file.metadata()?.len() as usize;
  let header_size = size % BANK_SIZE;
  let offset = header_size + ROM_MARKER_OFFSET;

  if offset + ROM_MARKER.len() > size {
    return Ok(false);
  }

  let mut buffer = vec![0u8; ROM_MARKER.len()];
  file.seek(SeekFrom::Start(offset as u64))?;
  file.read_exact(&mut buffer)?;
  Ok(buffer == ROM_MARKER)
}
