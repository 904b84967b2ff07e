use super::loader::PrototypeLoader;
use crate::core::combiner::ApplyCombiner;
use crate::core::components::container::ModuleContainer;
use crate::core::components::module::Module;
use crate::core::components::traits::{ModuleBehavior, ModuleType};
use crate::core::error::FactoryError;
use crate::core::execution::config::ConcurrencyMode;
use crate::core::shared::SharedMap;
use libloading::Library;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

/// A prototype together with the ways it can be attached
pub struct CompatibleGroup {
    pub prototype: Arc<Module>,
    pub combiners: Vec<ApplyCombiner>,
}

impl std::fmt::Debug for CompatibleGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompatibleGroup")
            .field("prototype", &self.prototype.name())
            .field("combiners", &self.combiners.len())
            .finish()
    }
}

/// Catalog of prototypes; creates initialized module instances from them.
///
/// Prototypes are initialized modules that never run. Names are unique: when a
/// loader delivers a name twice, the first one loaded is kept.
pub struct ModuleFactory {
    prototypes: SharedMap<String, Arc<Module>>,
    share_path: PathBuf,
    scan_mode: ConcurrencyMode,
    scan_pool: Option<rayon::ThreadPool>,
    // declared last: prototypes drop before the code they point into
    libraries: Mutex<Vec<Library>>,
}

impl ModuleFactory {
    pub fn new() -> Self {
        Self {
            prototypes: SharedMap::default(),
            share_path: PathBuf::new(),
            scan_mode: ConcurrencyMode::Rayon,
            scan_pool: None,
            libraries: Mutex::new(Vec::new()),
        }
    }

    /// Resource path assigned to prototypes registered from now on
    pub fn with_share_path(mut self, path: PathBuf) -> Self {
        self.share_path = path;
        self
    }

    /// How the compatibility scan is executed; `pool_size` only matters for Rayon
    pub fn with_scan_concurrency(mut self, mode: ConcurrencyMode, pool_size: Option<usize>) -> Self {
        self.scan_mode = mode;
        self.scan_pool = match (mode, pool_size) {
            (ConcurrencyMode::Rayon, Some(threads)) => {
                match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                    Ok(pool) => Some(pool),
                    Err(e) => {
                        warn!("[ModuleFactory] Can't build scan pool ({}); using the global pool", e);
                        None
                    }
                }
            }
            _ => None,
        };
        self
    }

    /// Register every prototype `loader` delivers.
    ///
    /// Returns how many were registered; rejected ones are logged and dropped.
    /// Libraries the loader opened are owned by the factory from now on.
    pub fn load(&self, loader: &dyn PrototypeLoader) -> usize {
        let mut delivered = Vec::new();
        loader.load(&mut delivered);
        info!("[ModuleFactory] Loader \"{}\" delivered {} prototypes", loader.name(), delivered.len());

        let mut registered = 0;
        for behavior in delivered {
            match self.add_prototype(behavior) {
                Ok(_) => registered += 1,
                Err(e) => error!("[ModuleFactory] {} Ignoring it.", e),
            }
        }
        let libraries = loader.take_libraries();
        if !libraries.is_empty() {
            debug!("[ModuleFactory] Keeping {} libraries of \"{}\" loaded", libraries.len(), loader.name());
            self.libraries.lock().extend(libraries);
        }
        registered
    }

    /// Initialize `behavior` and register it as a prototype
    pub fn add_prototype(&self, behavior: Box<dyn ModuleBehavior>) -> Result<Arc<Module>, FactoryError> {
        let name = behavior.name().to_string();
        if self.prototypes.count(&name) > 0 {
            return Err(FactoryError::PrototypeNotUnique { name });
        }

        let prototype = Module::new(behavior)?;
        prototype.initialize()?;
        prototype.set_local_path(self.share_path.clone());

        let mut prototypes = self.prototypes.write_ticket();
        if prototypes.contains_key(&name) {
            prototypes.suppress_unlock_condition();
            return Err(FactoryError::PrototypeNotUnique { name });
        }
        prototypes.insert(name.clone(), Arc::clone(&prototype));
        debug!("[ModuleFactory] Registered prototype \"{}\"", name);
        Ok(prototype)
    }

    /// Remove a prototype; existing instances are not affected
    pub fn remove_prototype(&self, name: &str) -> bool {
        self.prototypes.erase(&name.to_string()).is_some()
    }

    pub fn prototype(&self, name: &str) -> Option<Arc<Module>> {
        self.prototypes.read_ticket().get(name).cloned()
    }

    pub fn prototype_by_name(&self, name: &str) -> Result<Arc<Module>, FactoryError> {
        self.prototype(name).ok_or_else(|| FactoryError::PrototypeUnknown {
            name: name.to_string(),
        })
    }

    pub fn prototypes_of_type(&self, module_type: ModuleType) -> Vec<Arc<Module>> {
        self.prototypes
            .read_ticket()
            .values()
            .filter(|p| p.module_type() == module_type)
            .cloned()
            .collect()
    }

    /// All prototypes, ordered by name
    pub fn prototypes(&self) -> Vec<Arc<Module>> {
        self.prototypes.values_snapshot()
    }

    /// Whether `module` is one of the registered prototype instances
    pub fn is_prototype(&self, module: &Arc<Module>) -> bool {
        self.prototypes
            .read_ticket()
            .get(module.name())
            .map(|p| Arc::ptr_eq(p, module))
            .unwrap_or(false)
    }

    /// Create an initialized instance of a registered prototype
    pub fn create(&self, prototype: &Arc<Module>) -> Result<Arc<Module>, FactoryError> {
        if !self.is_prototype(prototype) {
            return Err(FactoryError::PrototypeUnknown {
                name: prototype.name().to_string(),
            });
        }

        let module = Module::new(prototype.clone_behavior())?;
        module.set_local_path(prototype.local_path());
        module.initialize()?;
        debug!("[ModuleFactory] Created an instance of \"{}\"", prototype.name());
        Ok(module)
    }

    pub fn create_by_name(&self, name: &str) -> Result<Arc<Module>, FactoryError> {
        let prototype = self.prototype_by_name(name)?;
        self.create(&prototype)
    }

    /// Prototypes that can be attached to `module`, with one combiner per valid
    /// output/input pairing. Without a module, prototypes that need no input.
    ///
    /// Groups are ordered by prototype name. Nothing is cached; prototypes may
    /// change between calls.
    pub fn get_compatible_prototypes(
        &self,
        container: &Arc<ModuleContainer>,
        module: Option<&Arc<Module>>,
    ) -> Vec<CompatibleGroup> {
        let prototypes = self.prototypes();
        let scan = |prototype: &Arc<Module>| compatible_group(container, module, prototype);

        let groups: Vec<CompatibleGroup> = match (self.scan_mode, &self.scan_pool) {
            (ConcurrencyMode::Sequential, _) => prototypes.iter().filter_map(scan).collect(),
            (ConcurrencyMode::Rayon, Some(pool)) => {
                pool.install(|| prototypes.par_iter().filter_map(scan).collect())
            }
            (ConcurrencyMode::Rayon, None) => prototypes.par_iter().filter_map(scan).collect(),
        };
        groups
    }

    /// Every prototype with a single add-only combiner
    pub fn get_all_prototypes(&self, container: &Arc<ModuleContainer>) -> Vec<CompatibleGroup> {
        self.prototypes()
            .into_iter()
            .map(|prototype| CompatibleGroup {
                combiners: vec![ApplyCombiner::add_only(Arc::clone(container), Arc::clone(&prototype))],
                prototype,
            })
            .collect()
    }
}

fn compatible_group(
    container: &Arc<ModuleContainer>,
    module: Option<&Arc<Module>>,
    prototype: &Arc<Module>,
) -> Option<CompatibleGroup> {
    if prototype.module_type() == ModuleType::Container {
        return None;
    }

    let combiners = match module {
        None if prototype.inputs().is_empty() => {
            vec![ApplyCombiner::add_only(Arc::clone(container), Arc::clone(prototype))]
        }
        None => Vec::new(),
        Some(module) => module
            .compatible_pairs(prototype)
            .into_iter()
            .map(|(output, input)| {
                ApplyCombiner::new(
                    Arc::clone(container),
                    Some(Arc::clone(module)),
                    output.name(),
                    Arc::clone(prototype),
                    input.name(),
                )
            })
            .collect(),
    };

    if combiners.is_empty() {
        None
    } else {
        Some(CompatibleGroup {
            prototype: Arc::clone(prototype),
            combiners,
        })
    }
}

impl Default for ModuleFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::components::testing::{Sink, Source};
    use crate::core::factory::loader::StaticLoader;

    fn factory() -> Arc<ModuleFactory> {
        let factory = ModuleFactory::new().with_share_path(PathBuf::from("/usr/share/modgraph"));
        let loader = StaticLoader::new("test", |out| {
            out.push(Box::new(Source::new("P1")));
            out.push(Box::new(Sink::new("P2")));
            out.push(Box::new(Sink::new("P1")));
        });
        assert_eq!(factory.load(&loader), 2);
        Arc::new(factory)
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let factory = factory();
        let p1 = factory.prototype("P1").unwrap();
        assert!(p1.inputs().is_empty());
        assert_eq!(
            factory.add_prototype(Box::new(Sink::new("P2"))).unwrap_err(),
            FactoryError::PrototypeNotUnique { name: "P2".into() }
        );
    }

    #[test]
    fn test_create() {
        let factory = factory();
        let m = factory.create_by_name("P2").unwrap();
        assert!(m.is_initialized());
        assert_eq!(m.name(), "P2");
        assert_eq!(m.local_path(), PathBuf::from("/usr/share/modgraph"));
        assert!(!factory.is_prototype(&m));
        assert!(factory.is_prototype(&factory.prototype("P2").unwrap()));

        assert_eq!(
            factory.create_by_name("X").unwrap_err(),
            FactoryError::PrototypeUnknown { name: "X".into() }
        );
        // instances are not prototypes
        assert!(factory.create(&m).is_err());
    }

    #[test]
    fn test_compatible_prototypes() {
        let factory = factory();
        let root = ModuleContainer::new("Root", "", Arc::clone(&factory)).unwrap();

        let starters = factory.get_compatible_prototypes(&root, None);
        assert_eq!(starters.len(), 1);
        assert_eq!(starters[0].prototype.name(), "P1");

        let p1 = factory.create_by_name("P1").unwrap();
        let groups = factory.get_compatible_prototypes(&root, Some(&p1));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].prototype.name(), "P2");
        assert_eq!(groups[0].combiners.len(), 1);
        assert_eq!(groups[0].combiners[0].source_connector(), "out");
        assert_eq!(groups[0].combiners[0].target_connector(), "in");

        let sequential = ModuleFactory::new().with_scan_concurrency(ConcurrencyMode::Sequential, None);
        sequential.add_prototype(Box::new(Sink::new("P2"))).unwrap();
        let sequential = Arc::new(sequential);
        assert_eq!(sequential.get_compatible_prototypes(&root, Some(&p1)).len(), 1);

        assert_eq!(factory.get_all_prototypes(&root).len(), 2);
        assert_eq!(factory.prototypes_of_type(ModuleType::Arbitrary).len(), 2);
    }
}
