pub mod core;

// Re-export commonly used types
pub use crate::core::combiner::{ApplyCombiner, Combiner, DisconnectCombiner, ProjectFileCombiner, ProjectRecord};
pub use crate::core::components::{ModuleBehavior, ModuleContainer, ModuleContext, ModuleType, Module};
pub use crate::core::connections::{Connector, DataType};
pub use crate::core::error::{ConnectionError, FactoryError, ModuleError, PropertyError};
pub use crate::core::execution::{Kernel, KernelConfig};
pub use crate::core::factory::ModuleFactory;
pub use crate::core::properties::{Property, PropertyGroup};
pub use crate::core::types::{ConnectorId, ModuleId};
