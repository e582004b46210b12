//! Identity of a single insertion step.
//!
//! The configured build order is a sequence of [`Descriptor`]s; each names
//! the kind of step ([`Symbol`]) and, for patches, modules, and external
//! tools, the specific source or tool it operates on.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Kind of an insertion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbol {
  Graphics,
  ExGraphics,
  SharedPalettes,
  Overworld,
  TitleScreen,
  Credits,
  GlobalExAnimation,
  TitleMoves,
  Levels,
  Map16,
  Pixi,
  ExternalTool,
  Patch,
  Module,
}

impl Symbol {
  /// Human-readable name used in log output and descriptor strings.
  pub fn display_name(self) -> &'static str {
    match self {
      Symbol::Graphics => "Graphics",
      Symbol::ExGraphics => "ExGraphics",
      Symbol::SharedPalettes => "Shared Palettes",
      Symbol::Overworld => "Overworld",
      Symbol::TitleScreen => "Title Screen",
      Symbol::Credits => "Credits",
      Symbol::GlobalExAnimation => "Global ExAnimation",
      Symbol::TitleMoves => "Title Moves",
      Symbol::Levels => "Levels",
      Symbol::Map16 => "Map16",
      Symbol::Pixi => "PIXI",
      Symbol::ExternalTool => "Tool",
      Symbol::Patch => "Patch",
      Symbol::Module => "Module",
    }
  }

  /// Whether identical descriptors of this symbol may appear more than once
  /// in the build order.
  pub fn allows_duplicates(self) -> bool {
    matches!(self, Symbol::Module | Symbol::ExternalTool)
  }
}

impl std::fmt::Display for Symbol {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.display_name())
  }
}

/// Identifies one insertable instance in the build order.
///
/// `name` carries the secondary identifier for symbols that need one: the
/// asm source path for `Module` and `Patch`, the configured tool name for
/// `ExternalTool`. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Descriptor {
  pub symbol: Symbol,
  pub name: Option<String>,
}

impl Descriptor {
  pub fn new(symbol: Symbol) -> Self {
    Self { symbol, name: None }
  }

  pub fn named(symbol: Symbol, name: impl Into<String>) -> Self {
    Self {
      symbol,
      name: Some(name.into()),
    }
  }

  /// Human-readable form, with any path name shown relative to
  /// `project_root` when possible.
  pub fn to_display_string(&self, project_root: &Path) -> String {
    match &self.name {
      None => self.symbol.display_name().to_string(),
      Some(name) => {
        let shown = Path::new(name)
          .strip_prefix(project_root)
          .map(|p| p.display().to_string())
          .unwrap_or_else(|_| name.clone());
        format!("{} '{}'", self.symbol.display_name(), shown)
      }
    }
  }
}

/// Errors detected while validating a configured build order.
#[derive(Debug, thiserror::Error)]
pub enum BuildOrderError {
  #[error("duplicate build order entry: {0}")]
  Duplicate(String),
}

/// Reject identical duplicate descriptors, except for symbols that
/// explicitly support repetition (`Module`, `ExternalTool`).
pub fn validate_build_order(order: &[Descriptor], project_root: &Path) -> Result<(), BuildOrderError> {
  let mut seen: std::collections::HashSet<&Descriptor> = std::collections::HashSet::new();
  for descriptor in order {
    if !seen.insert(descriptor) && !descriptor.symbol.allows_duplicates() {
      return Err(BuildOrderError::Duplicate(descriptor.to_display_string(project_root)));
    }
  }
  Ok(())
}
