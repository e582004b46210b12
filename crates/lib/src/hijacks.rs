//! Patch write ranges and the gone-bad check.
//!
//! A hijack is a contiguous range of ROM addresses a patch wrote. On a quick
//! build a patch may be replayed onto the reused ROM; any byte the old patch
//! wrote but the new one does not would keep stale data, so such a patch
//! invalidates the whole image.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A contiguous range of written ROM addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct Hijack {
  pub address: u32,
  pub length: u32,
}

impl Hijack {
  pub fn new(address: u32, length: u32) -> Self {
    Self { address, length }
  }
}

impl From<(u32, u32)> for Hijack {
  fn from((address, length): (u32, u32)) -> Self {
    Self { address, length }
  }
}

impl From<Hijack> for (u32, u32) {
  fn from(hijack: Hijack) -> Self {
    (hijack.address, hijack.length)
  }
}

/// True when some previously written address is no longer written.
///
/// New writes not present previously are fine. O(total bytes).
pub fn hijacks_gone_bad(old: &[Hijack], new: &[Hijack]) -> bool {
  let mut new_written: HashSet<u32> = HashSet::new();
  for hijack in new {
    for offset in 0..hijack.length {
      new_written.insert(hijack.address + offset);
    }
  }

  for hijack in old {
    for offset in 0..hijack.length {
      if !new_written.contains(&(hijack.address + offset)) {
        return true;
      }
    }
  }

  false
}

/// Contiguous ranges at which two equally-long images differ, plus one range
/// for any appended tail when `new` grew.
///
/// Used to derive the write set of a patch or module from the images before
/// and after its application.
pub fn diff_written_ranges(old: &[u8], new: &[u8]) -> Vec<Hijack> {
  let mut ranges = Vec::new();
  let common = old.len().min(new.len());

  let mut start: Option<usize> = None;
  for i in 0..common {
    if old[i] != new[i] {
      start.get_or_insert(i);
    } else if let Some(s) = start.take() {
      ranges.push(Hijack::new(s as u32, (i - s) as u32));
    }
  }
  if let Some(s) = start {
    ranges.push(Hijack::new(s as u32, (common - s) as u32));
  }

  if new.len() > common {
    ranges.push(Hijack::new(common as u32, (new.len() - common) as u32));
  }

  ranges
}
