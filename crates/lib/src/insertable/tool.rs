//! Insertables backed by an external executable.
//!
//! Most build-order symbols are handled by handing the temporary ROM to the
//! configured ROM editor with a symbol-specific verb; `Pixi` runs the
//! sprite tool and `ExternalTool` entries run whatever command the
//! configuration names. All of them observe their dependencies the same
//! way: the watched input files and folders, plus the executable itself.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, info};

use super::InsertionContext;
use crate::dependency::{observe_tree, ConfigurationDependency, Policy, ResourceDependency};
use crate::descriptor::Symbol;
use crate::error::EngineError;
use crate::insertable::Insertable;

/// Runs one external executable against the temporary ROM.
pub struct ToolInsertable {
  label: String,
  executable: PathBuf,
  args: Vec<OsString>,
  /// Inputs whose timestamps select reinsertion.
  watched: Vec<PathBuf>,
  /// Watched inputs that must exist before insertion.
  required: Vec<PathBuf>,
  config_dependencies: Vec<ConfigurationDependency>,
  /// When no watched paths are configured the tool cannot describe its
  /// inputs and dependency reporting fails.
  reports_dependencies: bool,
}

impl ToolInsertable {
  /// Build the insertable for an editor-driven symbol.
  pub fn for_symbol(symbol: Symbol, ctx: &InsertionContext<'_>) -> Result<Self, EngineError> {
    let config = ctx.config;
    let rom: OsString = ctx.temporary_rom.as_os_str().to_owned();
    let root = &config.project_root;

    let editor = || -> Result<PathBuf, EngineError> {
      config.tools.editor.clone().ok_or_else(|| {
        EngineError::ToolNotFound(format!("no editor tool configured, required by {}", symbol))
      })
    };

    let tool = match symbol {
      Symbol::Graphics => {
        let folder = config.graphics_dir();
        Self {
          label: symbol.display_name().to_string(),
          executable: editor()?,
          args: vec!["-ImportGFX".into(), rom],
          watched: vec![folder.clone()],
          required: vec![folder],
          config_dependencies: vec![
            editor_dependency(config),
            path_dependency(config, "paths.graphics"),
          ],
          reports_dependencies: true,
        }
      }
      Symbol::ExGraphics => {
        let folder = config.ex_graphics_dir();
        Self {
          label: symbol.display_name().to_string(),
          executable: editor()?,
          args: vec!["-ImportExGFX".into(), rom],
          watched: vec![folder.clone()],
          required: vec![folder],
          config_dependencies: vec![
            editor_dependency(config),
            path_dependency(config, "paths.ex_graphics"),
          ],
          reports_dependencies: true,
        }
      }
      Symbol::SharedPalettes => {
        let palettes = config
          .paths
          .shared_palettes
          .clone()
          .unwrap_or_else(|| root.join("shared.pal"));
        Self {
          label: symbol.display_name().to_string(),
          executable: editor()?,
          args: vec!["-ImportSharedPalette".into(), rom, palettes.clone().into()],
          watched: vec![palettes.clone()],
          required: vec![palettes],
          config_dependencies: vec![
            editor_dependency(config),
            path_dependency(config, "paths.shared_palettes"),
          ],
          reports_dependencies: true,
        }
      }
      Symbol::Map16 => {
        let map16 = config
          .paths
          .map16
          .clone()
          .unwrap_or_else(|| root.join("map16.map16"));
        Self {
          label: symbol.display_name().to_string(),
          executable: editor()?,
          args: vec!["-ImportAllMap16".into(), rom, map16.clone().into()],
          watched: vec![map16.clone()],
          required: vec![map16],
          config_dependencies: vec![editor_dependency(config), path_dependency(config, "paths.map16")],
          reports_dependencies: true,
        }
      }
      Symbol::Levels => {
        let levels = config.paths.levels.clone().ok_or_else(|| {
          EngineError::Insertion("levels are in the build order but no levels folder is configured".to_string())
        })?;
        Self {
          label: symbol.display_name().to_string(),
          executable: editor()?,
          args: vec!["-ImportMultLevels".into(), rom, levels.clone().into()],
          watched: vec![levels.clone()],
          required: vec![levels],
          config_dependencies: vec![editor_dependency(config), path_dependency(config, "paths.levels")],
          reports_dependencies: true,
        }
      }
      Symbol::Overworld
      | Symbol::TitleScreen
      | Symbol::Credits
      | Symbol::GlobalExAnimation
      | Symbol::TitleMoves => {
        let (verb, key, default_name) = transfer_parameters(symbol);
        let source = transfer_source(config, symbol).unwrap_or_else(|| root.join("extracted").join(default_name));
        Self {
          label: symbol.display_name().to_string(),
          executable: editor()?,
          args: vec![verb.into(), rom, source.clone().into()],
          watched: vec![source.clone()],
          required: vec![source],
          config_dependencies: vec![editor_dependency(config), path_dependency(config, key)],
          reports_dependencies: true,
        }
      }
      Symbol::Pixi => {
        let sprite_tool = config.tools.sprite_tool.clone().ok_or_else(|| {
          EngineError::ToolNotFound("no sprite tool configured, required by PIXI".to_string())
        })?;
        let sprites = config.paths.sprites.clone().unwrap_or_else(|| root.join("sprites"));
        Self {
          label: symbol.display_name().to_string(),
          executable: sprite_tool,
          args: vec![rom],
          watched: vec![sprites.clone()],
          required: vec![sprites],
          config_dependencies: vec![
            ConfigurationDependency::new(
              "tools.sprite_tool",
              ctx.config.value_by_key("tools.sprite_tool"),
              Policy::Rebuild,
            ),
            path_dependency(config, "paths.sprites"),
          ],
          reports_dependencies: true,
        }
      }
      Symbol::ExternalTool | Symbol::Patch | Symbol::Module => {
        return Err(EngineError::Insertion(format!(
          "{} cannot be constructed as an editor insertable",
          symbol
        )))
      }
    };

    Ok(tool)
  }

  /// Build the insertable for a configured external tool.
  pub fn for_external(name: &str, ctx: &InsertionContext<'_>) -> Result<Self, EngineError> {
    let config = ctx.config;
    let tool_config = config.tools.external.get(name).ok_or_else(|| {
      EngineError::ToolNotFound(format!("external tool '{}' is not configured", name))
    })?;

    let mut args: Vec<OsString> = tool_config.args.iter().map(OsString::from).collect();
    if tool_config.pass_rom {
      args.push(ctx.temporary_rom.as_os_str().to_owned());
    }

    Ok(Self {
      label: format!("Tool '{}'", name),
      executable: tool_config.executable.clone(),
      args,
      watched: tool_config.watched.clone(),
      required: Vec::new(),
      config_dependencies: vec![ConfigurationDependency::new(
        format!("tools.external.{}", name),
        config.value_by_key(&format!("tools.external.{}", name)),
        Policy::Reinsert,
      )],
      reports_dependencies: !tool_config.watched.is_empty(),
    })
  }

  fn run(&self) -> Result<(), EngineError> {
    info!(tool = %self.label, "inserting");
    debug!(executable = %self.executable.display(), "invoking tool");

    let status = Command::new(&self.executable).args(&self.args).status()?;
    if !status.success() {
      return Err(EngineError::Insertion(format!(
        "{} failed with exit code {:?}",
        self.label,
        status.code()
      )));
    }
    Ok(())
  }
}

impl Insertable for ToolInsertable {
  fn init(&mut self) -> Result<(), EngineError> {
    if !self.executable.is_file() {
      return Err(EngineError::ToolNotFound(format!(
        "executable for {} not found at '{}'",
        self.label,
        self.executable.display()
      )));
    }
    for path in &self.required {
      if !path.exists() {
        return Err(EngineError::ResourceNotFound(format!(
          "input of {} not found at '{}'",
          self.label,
          path.display()
        )));
      }
    }
    Ok(())
  }

  fn insert(&mut self) -> Result<(), EngineError> {
    self.run()
  }

  fn insert_with_dependencies(&mut self) -> Result<HashSet<ResourceDependency>, EngineError> {
    // The insertion itself still happens; only the bookkeeping is lost.
    self.run()?;
    if !self.reports_dependencies {
      return Err(EngineError::NoDependencyReport(self.label.clone()));
    }

    let mut dependencies = HashSet::new();
    dependencies.insert(ResourceDependency::observe(&self.executable, Policy::Rebuild));
    for path in &self.watched {
      dependencies.extend(observe_tree(path, Policy::Reinsert));
    }
    Ok(dependencies)
  }

  fn configuration_dependencies(&self) -> Vec<ConfigurationDependency> {
    self.config_dependencies.clone()
  }
}

fn editor_dependency(config: &crate::config::Configuration) -> ConfigurationDependency {
  ConfigurationDependency::new("tools.editor", config.value_by_key("tools.editor"), Policy::Rebuild)
}

fn path_dependency(config: &crate::config::Configuration, key: &str) -> ConfigurationDependency {
  ConfigurationDependency::new(key, config.value_by_key(key), Policy::Reinsert)
}

fn transfer_parameters(symbol: Symbol) -> (&'static str, &'static str, &'static str) {
  match symbol {
    Symbol::Overworld => ("-TransferOverworld", "paths.overworld", "overworld.sfc"),
    Symbol::TitleScreen => ("-TransferTitleScreen", "paths.title_screen", "title_screen.sfc"),
    Symbol::Credits => ("-TransferCredits", "paths.credits", "credits.sfc"),
    Symbol::GlobalExAnimation => (
      "-TransferLevelGlobalExAnim",
      "paths.global_exanimation",
      "global_exanimation.sfc",
    ),
    Symbol::TitleMoves => ("-ImportTitleMoves", "paths.title_moves", "title_moves.zst"),
    _ => unreachable!("not a transfer symbol"),
  }
}

fn transfer_source(config: &crate::config::Configuration, symbol: Symbol) -> Option<PathBuf> {
  match symbol {
    Symbol::Overworld => config.paths.overworld.clone(),
    Symbol::TitleScreen => config.paths.title_screen.clone(),
    Symbol::Credits => config.paths.credits.clone(),
    Symbol::GlobalExAnimation => config.paths.global_exanimation.clone(),
    Symbol::TitleMoves => config.paths.title_moves.clone(),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::assembler::{Assembler, AsarTool};
  use crate::config::{Configuration, ExternalToolConfig, ProjectPaths, Tools};
  use crate::descriptor::Descriptor;
  use std::path::Path;
  use tempfile::TempDir;

  fn test_config(root: &Path) -> Configuration {
    Configuration {
      project_root: root.to_path_buf(),
      output_rom: root.join("hack.sfc"),
      temporary_folder: None,
      rom_size: None,
      paths: ProjectPaths::default(),
      tools: Tools {
        editor: Some(root.join("editor")),
        assembler: Some(root.join("asar")),
        sprite_tool: None,
        external: std::collections::BTreeMap::new(),
      },
      build_order: vec![Descriptor::new(Symbol::Graphics)],
    }
  }

  fn context<'a>(
    config: &'a Configuration,
    rom: &'a Path,
    assembler: &'a dyn Assembler,
  ) -> InsertionContext<'a> {
    InsertionContext {
      config,
      temporary_rom: rom,
      assembler,
    }
  }

  #[test]
  fn graphics_declares_editor_and_folder_dependencies() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let rom = temp.path().join("temp.sfc");
    let assembler = AsarTool::new(temp.path().join("asar"));
    let ctx = context(&config, &rom, &assembler);

    let tool = ToolInsertable::for_symbol(Symbol::Graphics, &ctx).unwrap();
    let keys: Vec<_> = tool
      .configuration_dependencies()
      .into_iter()
      .map(|d| d.config_keys)
      .collect();
    assert_eq!(keys, vec!["tools.editor".to_string(), "paths.graphics".to_string()]);
  }

  #[test]
  fn init_requires_executable_and_inputs() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let rom = temp.path().join("temp.sfc");
    let assembler = AsarTool::new(temp.path().join("asar"));
    let ctx = context(&config, &rom, &assembler);

    let mut tool = ToolInsertable::for_symbol(Symbol::Graphics, &ctx).unwrap();
    assert!(matches!(tool.init(), Err(EngineError::ToolNotFound(_))));

    std::fs::write(temp.path().join("editor"), b"").unwrap();
    assert!(matches!(tool.init(), Err(EngineError::ResourceNotFound(_))));

    std::fs::create_dir_all(temp.path().join("Graphics")).unwrap();
    assert!(tool.init().is_ok());
  }

  #[test]
  fn levels_without_configured_folder_is_an_error() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let rom = temp.path().join("temp.sfc");
    let assembler = AsarTool::new(temp.path().join("asar"));
    let ctx = context(&config, &rom, &assembler);

    assert!(matches!(
      ToolInsertable::for_symbol(Symbol::Levels, &ctx),
      Err(EngineError::Insertion(_))
    ));
  }

  #[cfg(unix)]
  #[test]
  fn unwatched_external_tool_inserts_but_cannot_report_dependencies() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let mut config = test_config(temp.path());
    std::fs::write(temp.path().join("gps"), "#!/bin/sh\ntouch \"$(dirname \"$0\")/ran\"\n").unwrap();
    std::fs::set_permissions(temp.path().join("gps"), std::fs::Permissions::from_mode(0o755)).unwrap();
    config.tools.external.insert(
      "gps".to_string(),
      ExternalToolConfig {
        executable: temp.path().join("gps"),
        args: vec![],
        watched: vec![],
        pass_rom: true,
      },
    );
    let rom = temp.path().join("temp.sfc");
    let assembler = AsarTool::new(temp.path().join("asar"));
    let ctx = context(&config, &rom, &assembler);

    let mut tool = ToolInsertable::for_external("gps", &ctx).unwrap();
    assert!(matches!(
      tool.insert_with_dependencies(),
      Err(EngineError::NoDependencyReport(_))
    ));
    // The tool still ran; only the bookkeeping was lost.
    assert!(temp.path().join("ran").exists());
  }

  #[test]
  fn unknown_external_tool_is_tool_not_found() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let rom = temp.path().join("temp.sfc");
    let assembler = AsarTool::new(temp.path().join("asar"));
    let ctx = context(&config, &rom, &assembler);

    assert!(matches!(
      ToolInsertable::for_external("nope", &ctx),
      Err(EngineError::ToolNotFound(_))
    ));
  }

  #[cfg(unix)]
  #[test]
  fn insert_with_dependencies_observes_watched_tree() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    std::fs::write(temp.path().join("editor"), "#!/bin/sh\nexit 0\n").unwrap();
    std::fs::set_permissions(temp.path().join("editor"), std::fs::Permissions::from_mode(0o755)).unwrap();
    std::fs::create_dir_all(temp.path().join("Graphics")).unwrap();
    std::fs::write(temp.path().join("Graphics/GFX00.bin"), b"gfx").unwrap();

    let rom = temp.path().join("temp.sfc");
    let assembler = AsarTool::new(temp.path().join("asar"));
    let ctx = context(&config, &rom, &assembler);

    let mut tool = ToolInsertable::for_symbol(Symbol::Graphics, &ctx).unwrap();
    tool.init().unwrap();
    let deps = tool.insert_with_dependencies().unwrap();

    let paths: Vec<_> = deps.iter().map(|d| d.dependent_path.clone()).collect();
    assert!(paths.contains(&temp.path().join("Graphics/GFX00.bin")));
    assert!(paths.contains(&temp.path().join("editor")));
  }
}
