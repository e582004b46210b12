//! Descriptor-to-insertable construction.

use super::{Insertable, InsertableFactory, InsertionContext, ModuleInsertable, PatchInsertable, ToolInsertable};
use crate::descriptor::{Descriptor, Symbol};
use crate::error::EngineError;

/// The factory wiring every symbol to its standard insertable.
#[derive(Debug, Default)]
pub struct StandardFactory;

impl InsertableFactory for StandardFactory {
  fn create<'a>(
    &self,
    descriptor: &Descriptor,
    ctx: &InsertionContext<'a>,
  ) -> Result<Box<dyn Insertable + 'a>, EngineError> {
    match descriptor.symbol {
      Symbol::Patch => {
        let name = required_name(descriptor)?;
        Ok(Box::new(PatchInsertable::new(name, ctx)))
      }
      Symbol::Module => {
        let name = required_name(descriptor)?;
        Ok(Box::new(ModuleInsertable::new(name, ctx)))
      }
      Symbol::ExternalTool => {
        let name = required_name(descriptor)?;
        Ok(Box::new(ToolInsertable::for_external(name, ctx)?))
      }
      symbol => Ok(Box::new(ToolInsertable::for_symbol(symbol, ctx)?)),
    }
  }
}

fn required_name(descriptor: &Descriptor) -> Result<&str, EngineError> {
  descriptor.name.as_deref().ok_or_else(|| {
    EngineError::Insertion(format!("{} build order entry carries no name", descriptor.symbol))
  })
}
