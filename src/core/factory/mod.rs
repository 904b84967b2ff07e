pub mod loader;
pub mod registry;

// Re-export commonly used types
pub use loader::{BuiltinLoader, EntryFn, PrototypeLoader, SharedLibraryLoader, StaticLoader, ENTRY_SYMBOL};
pub use registry::{CompatibleGroup, ModuleFactory};
