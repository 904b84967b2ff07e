//! Configuration for the module kernel
//!
//! This module provides the settings used to assemble the factory and the
//! root container, including how the prototype compatibility scan runs.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Enumeration of supported concurrency modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcurrencyMode {
    /// Prototypes are checked one after another on the calling thread
    Sequential,
    /// Prototypes are checked in parallel using Rayon
    Rayon,
}

impl Default for ConcurrencyMode {
    fn default() -> Self {
        ConcurrencyMode::Sequential
    }
}

/// Configuration for a [`Kernel`](super::kernel::Kernel)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Name of the root container
    pub root_name: String,
    /// Whether a crashing module crashes the root container too.
    /// The process-wide root keeps running by default.
    pub crash_root_on_module_crash: bool,
    /// Resource path handed to every prototype and copied to its instances
    pub share_path: Option<PathBuf>,
    /// Install the default `env_logger` backend when the kernel starts
    pub init_logging: bool,
    /// How `get_compatible_prototypes` walks the prototype list
    pub compatibility_scan: ConcurrencyMode,
    /// Worker count of the scan pool.
    /// Only relevant when `compatibility_scan` is Rayon; `None` uses the global pool.
    pub thread_pool_size: Option<usize>,
    /// Register the built-in prototypes (the data module)
    pub register_builtin_prototypes: bool,
    /// Directory scanned for module libraries at startup
    pub module_path: Option<PathBuf>,
}

impl KernelConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            root_name: "Root".to_string(),
            crash_root_on_module_crash: false,
            share_path: None,
            init_logging: true,
            compatibility_scan: ConcurrencyMode::default(),
            thread_pool_size: None,
            register_builtin_prototypes: true,
            module_path: None,
        }
    }

    pub fn with_root_name(mut self, name: &str) -> Self {
        self.root_name = name.to_string();
        self
    }

    pub fn with_crash_root_on_module_crash(mut self, crash: bool) -> Self {
        self.crash_root_on_module_crash = crash;
        self
    }

    pub fn with_share_path(mut self, path: PathBuf) -> Self {
        self.share_path = Some(path);
        self
    }

    pub fn with_logging(mut self, init: bool) -> Self {
        self.init_logging = init;
        self
    }

    /// Set the concurrency mode of the compatibility scan
    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.compatibility_scan = mode;
        self
    }

    /// Set the thread pool size for the parallel scan
    ///
    /// # Note
    /// This setting only has an effect when the scan mode is Rayon
    pub fn with_thread_pool_size(mut self, size: usize) -> Self {
        self.thread_pool_size = Some(size);
        self
    }

    pub fn with_builtin_prototypes(mut self, register: bool) -> Self {
        self.register_builtin_prototypes = register;
        self
    }

    pub fn with_module_path(mut self, path: PathBuf) -> Self {
        self.module_path = Some(path);
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
