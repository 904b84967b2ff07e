use crate::core::components::context::{ConnectorSetup, ModuleContext};
use crate::core::error::{ModuleError, PropertyError};
use crate::core::properties::PropertyGroup;

/// What a module is, as far as the kernel cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleType {
    /// Plain processing module
    Arbitrary,
    /// Loads a dataset; serialized as a `DATA` record
    Data,
    /// Owns child modules
    Container,
}

/// Precondition checked on the module thread before `module_main` runs
pub trait Requirement: Send + Sync {
    fn is_met(&self) -> bool;

    /// Human readable text used in logs and errors
    fn description(&self) -> String;
}

/// Behavior of a module type.
///
/// The kernel wraps a behavior in a [`Module`](crate::core::components::Module),
/// which owns the threading, lifecycle flags, connectors and properties. The
/// structural hooks run once during `initialize`; `module_main` runs on the
/// module's own thread.
pub trait ModuleBehavior: Send {
    /// Name of the module type; prototypes are registered under it
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn module_type(&self) -> ModuleType {
        ModuleType::Arbitrary
    }

    /// Fresh, unconfigured behavior of the same type
    fn factory(&self) -> Box<dyn ModuleBehavior>;

    /// Declare input and output connectors
    fn connectors(&mut self, _setup: &mut ConnectorSetup) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Declare parameters in `properties` and outputs in `information`
    fn properties(&mut self, _properties: &PropertyGroup, _information: &PropertyGroup) -> Result<(), PropertyError> {
        Ok(())
    }

    fn requirements(&self) -> Vec<Box<dyn Requirement>> {
        Vec::new()
    }

    /// The module's run loop.
    ///
    /// Call [`ModuleContext::ready`] once set up, then loop on
    /// [`ModuleContext::wait`] until [`ModuleContext::should_stop`] holds.
    fn module_main(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError>;
}
