pub mod container;
pub mod context;
pub mod data_module;
pub mod lifecycle;
pub mod module;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use container::{ContainerSignals, ModuleContainer, PendingThread};
pub use context::{ConnectorSetup, ModuleContext};
pub use data_module::{DataModule, DATA_MODULE_NAME, FILENAME_PROPERTY};
pub use lifecycle::Lifecycle;
pub use module::{Module, ModuleErrorEvent};
pub use traits::{ModuleBehavior, ModuleType, Requirement};
