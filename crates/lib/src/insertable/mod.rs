//! The contract the engine drives insertables through.
//!
//! An insertable is one unit of work that mutates the temporary ROM. The
//! engine constructs it from its descriptor through a factory, initializes
//! it, and asks it to insert itself, preferably reporting the resource
//! dependencies it observed along the way. Construction stays behind the
//! [`InsertableFactory`] trait so tests can substitute their own.

mod factory;
mod module;
mod patch;
mod tool;

pub use factory::StandardFactory;
pub use module::ModuleInsertable;
pub use patch::PatchInsertable;
pub use tool::ToolInsertable;

use std::collections::HashSet;
use std::path::Path;

use crate::assembler::Assembler;
use crate::config::Configuration;
use crate::dependency::{ConfigurationDependency, ResourceDependency};
use crate::descriptor::Descriptor;
use crate::error::EngineError;
use crate::hijacks::Hijack;

/// Everything an insertable needs from its surroundings.
pub struct InsertionContext<'a> {
  pub config: &'a Configuration,
  pub temporary_rom: &'a Path,
  pub assembler: &'a dyn Assembler,
}

/// A unit of work that mutates the temporary ROM.
pub trait Insertable {
  /// Prepare and validate: external tools exist, required inputs are
  /// present. Fails with `ToolNotFound` or `ResourceNotFound`.
  fn init(&mut self) -> Result<(), EngineError>;

  /// Perform the insertion without dependency bookkeeping. Used once a
  /// dependency report has already been lost this run.
  fn insert(&mut self) -> Result<(), EngineError>;

  /// Perform the insertion and report the resource dependencies observed.
  /// Fails with `NoDependencyReport` when the insertable cannot describe
  /// its inputs, or `Insertion` on failure.
  fn insert_with_dependencies(&mut self) -> Result<HashSet<ResourceDependency>, EngineError>;

  /// Configuration dependencies declared at construction time.
  fn configuration_dependencies(&self) -> Vec<ConfigurationDependency>;

  /// Ranges of ROM bytes written, known after insertion. `Some` for
  /// patches, `None` for everything else.
  fn hijacks(&self) -> Option<Vec<Hijack>> {
    None
  }
}

/// Maps descriptors to insertables.
pub trait InsertableFactory {
  fn create<'a>(
    &self,
    descriptor: &Descriptor,
    ctx: &InsertionContext<'a>,
  ) -> Result<Box<dyn Insertable + 'a>, EngineError>;
}

/// Resolve a descriptor name that denotes a path against the project root.
pub(crate) fn resolve_name_path(config: &Configuration, name: &str) -> std::path::PathBuf {
  let path = Path::new(name);
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    config.project_root.join(path)
  }
}
