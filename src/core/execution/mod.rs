pub mod config;
pub mod kernel;
pub mod logging;

// Re-export commonly used types
pub use config::{ConcurrencyMode, KernelConfig};
pub use kernel::Kernel;
