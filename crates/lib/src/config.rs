//! Project configuration.
//!
//! The configuration is a typed DTO loaded from `romforge.json` at the
//! project root. Insertables declare configuration dependencies against it
//! by dotted key (`rom_size`, `paths.levels`, ...); [`Configuration::value_by_key`]
//! resolves those keys against the serialized tree so recorded values can be
//! compared verbatim across builds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::{validate_build_order, BuildOrderError, Descriptor};

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read configuration: {0}")]
  Read(#[source] std::io::Error),

  #[error("failed to parse configuration: {0}")]
  Parse(#[source] serde_json::Error),

  #[error(transparent)]
  BuildOrder(#[from] BuildOrderError),
}

/// Input locations, all optional with project-relative defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectPaths {
  pub graphics: Option<PathBuf>,
  pub ex_graphics: Option<PathBuf>,
  pub shared_palettes: Option<PathBuf>,
  pub map16: Option<PathBuf>,
  pub levels: Option<PathBuf>,
  pub overworld: Option<PathBuf>,
  pub title_screen: Option<PathBuf>,
  pub credits: Option<PathBuf>,
  pub global_exanimation: Option<PathBuf>,
  pub title_moves: Option<PathBuf>,
  pub sprites: Option<PathBuf>,
  pub modules: Option<PathBuf>,
}

/// An arbitrary external tool referenced by `ExternalTool` build order
/// entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalToolConfig {
  pub executable: PathBuf,
  pub args: Vec<String>,
  /// Paths whose contents this tool consumes; watched for reinsertion.
  pub watched: Vec<PathBuf>,
  /// Whether the temporary ROM path is appended to the argument list.
  pub pass_rom: bool,
}

/// Executables the standard insertables drive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tools {
  /// The ROM editor used for graphics, levels, map16 and transfers.
  pub editor: Option<PathBuf>,
  /// The patch assembler.
  pub assembler: Option<PathBuf>,
  /// The sprite insertion tool.
  pub sprite_tool: Option<PathBuf>,
  /// Arbitrary tools keyed by the name used in the build order.
  pub external: BTreeMap<String, ExternalToolConfig>,
}

/// The full project configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
  /// Root everything else is resolved against.
  pub project_root: PathBuf,
  /// The published ROM image.
  pub output_rom: PathBuf,
  /// Scratch folder the engine owns during a build.
  #[serde(default)]
  pub temporary_folder: Option<PathBuf>,
  /// Expected ROM size in bytes, when pinned.
  #[serde(default)]
  pub rom_size: Option<u64>,
  #[serde(default)]
  pub paths: ProjectPaths,
  #[serde(default)]
  pub tools: Tools,
  pub build_order: Vec<Descriptor>,
}

impl Configuration {
  /// Load and validate a configuration file.
  ///
  /// A relative `project_root` is resolved against the configuration file's
  /// own directory; every other relative path is resolved against the
  /// project root so the engine never depends on the working directory.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
    let mut config: Configuration = serde_json::from_str(&content).map_err(ConfigError::Parse)?;

    if config.project_root.is_relative() {
      if let Some(parent) = path.parent() {
        config.project_root = parent.join(&config.project_root);
      }
    }
    config.resolve_paths();

    config.validate()?;
    Ok(config)
  }

  /// Anchor every relative path at the project root.
  fn resolve_paths(&mut self) {
    let root = self.project_root.clone();
    let anchor = |path: &mut PathBuf| {
      if path.is_relative() {
        let absolute = root.join(path.as_path());
        *path = absolute;
      }
    };
    let anchor_opt = |path: &mut Option<PathBuf>| {
      if let Some(path) = path.as_mut() {
        anchor(path);
      }
    };

    anchor(&mut self.output_rom);
    anchor_opt(&mut self.temporary_folder);
    anchor_opt(&mut self.paths.graphics);
    anchor_opt(&mut self.paths.ex_graphics);
    anchor_opt(&mut self.paths.shared_palettes);
    anchor_opt(&mut self.paths.map16);
    anchor_opt(&mut self.paths.levels);
    anchor_opt(&mut self.paths.overworld);
    anchor_opt(&mut self.paths.title_screen);
    anchor_opt(&mut self.paths.credits);
    anchor_opt(&mut self.paths.global_exanimation);
    anchor_opt(&mut self.paths.title_moves);
    anchor_opt(&mut self.paths.sprites);
    anchor_opt(&mut self.paths.modules);
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    validate_build_order(&self.build_order, &self.project_root)?;
    Ok(())
  }

  /// Resolve a dotted key (`paths.levels`) against the configuration tree.
  ///
  /// Returns `Value::Null` for unset optionals and unknown keys, which makes
  /// recorded dependency values comparable without special cases.
  pub fn value_by_key(&self, dotted: &str) -> serde_json::Value {
    let mut current = match serde_json::to_value(self) {
      Ok(value) => value,
      Err(_) => return serde_json::Value::Null,
    };
    for segment in dotted.split('.') {
      current = match current {
        serde_json::Value::Object(mut map) => map.remove(segment).unwrap_or(serde_json::Value::Null),
        _ => return serde_json::Value::Null,
      };
    }
    current
  }

  pub fn temporary_folder(&self) -> PathBuf {
    self
      .temporary_folder
      .clone()
      .unwrap_or_else(|| self.project_root.join(".cache").join("temp"))
  }

  pub fn graphics_dir(&self) -> PathBuf {
    self.path_or_default(&self.paths.graphics, "Graphics")
  }

  pub fn ex_graphics_dir(&self) -> PathBuf {
    self.path_or_default(&self.paths.ex_graphics, "ExGraphics")
  }

  pub fn modules_dir(&self) -> PathBuf {
    self.path_or_default(&self.paths.modules, "modules")
  }

  fn path_or_default(&self, configured: &Option<PathBuf>, default: &str) -> PathBuf {
    match configured {
      Some(path) if path.is_absolute() => path.clone(),
      Some(path) => self.project_root.join(path),
      None => self.project_root.join(default),
    }
  }
}
