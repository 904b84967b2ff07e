use super::config::KernelConfig;
use super::logging;
use crate::core::combiner::{Combiner, ProjectFileCombiner, ProjectLoadReport};
use crate::core::components::container::ModuleContainer;
use crate::core::error::ModuleError;
use crate::core::factory::{BuiltinLoader, ModuleFactory, PrototypeLoader, SharedLibraryLoader};
use log::info;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Owns the prototype factory and the running root container.
///
/// There is no global instance; hand the kernel (or its factory and root) to
/// whatever needs them.
pub struct Kernel {
    config: KernelConfig,
    factory: Arc<ModuleFactory>,
    root: Arc<ModuleContainer>,
}

impl Kernel {
    /// Build the factory and start the root container
    pub fn new(config: KernelConfig) -> Result<Kernel, ModuleError> {
        if config.init_logging {
            logging::init();
        }

        let mut factory = ModuleFactory::new().with_scan_concurrency(config.compatibility_scan, config.thread_pool_size);
        if let Some(path) = &config.share_path {
            factory = factory.with_share_path(path.clone());
        }
        let factory = Arc::new(factory);
        if config.register_builtin_prototypes {
            factory.load(&BuiltinLoader);
        }
        if let Some(path) = &config.module_path {
            factory.load(&SharedLibraryLoader::new(path.clone()));
        }

        let root = ModuleContainer::new(&config.root_name, "Root container of the module graph", Arc::clone(&factory))?;
        root.set_crash_if_module_crashes(config.crash_root_on_module_crash);
        root.start()?;
        root.module().wait_ready_or_crashed();

        info!(
            "[Kernel] Started \"{}\" with {} prototypes",
            config.root_name,
            factory.prototypes().len()
        );
        Ok(Kernel { config, factory, root })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn factory(&self) -> &Arc<ModuleFactory> {
        &self.factory
    }

    pub fn root(&self) -> &Arc<ModuleContainer> {
        &self.root
    }

    /// Register the prototypes of another loader
    pub fn load_prototypes(&self, loader: &dyn PrototypeLoader) -> usize {
        self.factory.load(loader)
    }

    /// Replay a project file into the root container on the calling thread
    pub fn load_project(&self, path: &Path) -> io::Result<ProjectLoadReport> {
        let mut combiner = ProjectFileCombiner::new(Arc::clone(&self.root));
        combiner.load_file(path)?;
        Ok(combiner.apply())
    }

    /// Write the root container's graph as a project file
    pub fn save_project(&self, path: &Path) -> io::Result<()> {
        let mut file = io::BufWriter::new(std::fs::File::create(path)?);
        ProjectFileCombiner::new(Arc::clone(&self.root)).save(&mut file)?;
        io::Write::flush(&mut file)
    }

    /// Stop every module and the root container
    pub fn shutdown(&self) {
        info!("[Kernel] Shutting down \"{}\"", self.config.root_name);
        self.root.stop();
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("root", &self.config.root_name)
            .field("modules", &self.root.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::components::data_module::DATA_MODULE_NAME;
    use crate::core::components::testing::Failing;
    use crate::core::factory::StaticLoader;
    use crate::core::components::traits::ModuleBehavior;

    fn config() -> KernelConfig {
        KernelConfig::new().with_logging(false)
    }

    #[test]
    fn test_new_registers_builtins_and_starts_root() {
        let kernel = Kernel::new(config()).unwrap();
        assert!(kernel.factory().prototype(DATA_MODULE_NAME).is_some());
        assert!(kernel.root().module().is_ready());
        assert!(!kernel.root().crash_if_module_crashes());
        kernel.shutdown();
        assert!(!kernel.root().module().is_running());
    }

    #[test]
    fn test_without_builtins() {
        let kernel = Kernel::new(config().with_builtin_prototypes(false)).unwrap();
        assert!(kernel.factory().prototypes().is_empty());
        kernel.shutdown();
    }

    #[test]
    fn test_empty_module_path_adds_nothing() {
        let dir = std::env::temp_dir().join(format!("modgraph-modules-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let kernel = Kernel::new(config().with_module_path(dir.clone())).unwrap();
        assert_eq!(kernel.factory().prototypes().len(), 1);
        kernel.shutdown();
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_root_survives_crashing_module() {
        let kernel = Kernel::new(config()).unwrap();
        let loaded = kernel.load_prototypes(&StaticLoader::new("test", |out: &mut Vec<Box<dyn ModuleBehavior>>| {
            out.push(Box::new(Failing::erroring()));
        }));
        assert_eq!(loaded, 1);

        let module = kernel.factory().create_by_name("Failing").unwrap();
        kernel.root().add(&module, true).unwrap();
        module.wait_ready_or_crashed();
        assert!(module.is_crashed());
        assert!(!kernel.root().module().is_crashed());
        kernel.shutdown();
    }
}
