use crate::core::components::data_module::DataModule;
use crate::core::components::traits::ModuleBehavior;
use crate::core::error::FactoryError;
use libloading::{Library, Symbol};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Source of prototypes.
///
/// A loader appends freshly allocated behaviors to `out`; the factory takes
/// ownership of everything appended.
pub trait PrototypeLoader {
    /// Used in log messages
    fn name(&self) -> &str;

    fn load(&self, out: &mut Vec<Box<dyn ModuleBehavior>>);

    /// Libraries whose code the delivered prototypes live in.
    ///
    /// Called by the factory right after `load`; the factory keeps them open
    /// for as long as it exists.
    fn take_libraries(&self) -> Vec<Library> {
        Vec::new()
    }
}

/// Loader backed by a closure
pub struct StaticLoader<F>
where
    F: Fn(&mut Vec<Box<dyn ModuleBehavior>>),
{
    name: String,
    entry: F,
}

impl<F> StaticLoader<F>
where
    F: Fn(&mut Vec<Box<dyn ModuleBehavior>>),
{
    pub fn new(name: &str, entry: F) -> Self {
        Self {
            name: name.to_string(),
            entry,
        }
    }
}

impl<F> PrototypeLoader for StaticLoader<F>
where
    F: Fn(&mut Vec<Box<dyn ModuleBehavior>>),
{
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, out: &mut Vec<Box<dyn ModuleBehavior>>) {
        (self.entry)(out)
    }
}

/// Prototypes shipped with the kernel
pub struct BuiltinLoader;

impl PrototypeLoader for BuiltinLoader {
    fn name(&self) -> &str {
        "builtin"
    }

    fn load(&self, out: &mut Vec<Box<dyn ModuleBehavior>>) {
        out.push(Box::new(DataModule));
    }
}

/// Name of the function every module library exports
pub const ENTRY_SYMBOL: &str = "modgraph_load_prototypes";

/// Signature of [`ENTRY_SYMBOL`].
///
/// A library declares it as
/// `#[no_mangle] pub fn modgraph_load_prototypes(out: &mut Vec<Box<dyn ModuleBehavior>>)`
/// and must be built against the same `modgraph` and compiler as the host.
pub type EntryFn = unsafe extern "Rust" fn(&mut Vec<Box<dyn ModuleBehavior>>);

/// Loads prototypes from every shared library in a directory.
///
/// Only files with the platform's library extension are considered. Libraries
/// that can't be opened or lack [`ENTRY_SYMBOL`] are logged and skipped.
pub struct SharedLibraryLoader {
    directory: PathBuf,
    libraries: Mutex<Vec<Library>>,
}

impl SharedLibraryLoader {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            libraries: Mutex::new(Vec::new()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Library files in the directory, sorted by path
    pub fn candidates(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("[ModuleLoader] Can't read {}: {}", self.directory.display(), e);
                return Vec::new();
            }
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(std::env::consts::DLL_EXTENSION))
            .collect();
        paths.sort();
        paths
    }

    /// Open one library and run its entry function.
    ///
    /// On success the library is kept until the factory takes it; returns the
    /// number of prototypes it appended to `out`.
    pub fn load_library(&self, path: &Path, out: &mut Vec<Box<dyn ModuleBehavior>>) -> Result<usize, FactoryError> {
        // SAFETY: opening a library runs its initializers; module libraries are trusted plugins.
        let library = unsafe { Library::new(path) }.map_err(|e| FactoryError::LibraryOpen {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let before = out.len();
        {
            // SAFETY: the symbol is declared with `EntryFn`'s signature by contract.
            let entry: Symbol<EntryFn> =
                unsafe { library.get(ENTRY_SYMBOL.as_bytes()) }.map_err(|_| FactoryError::EntryMissing {
                    path: path.display().to_string(),
                    symbol: ENTRY_SYMBOL.to_string(),
                })?;
            // SAFETY: see above; the library stays open while its prototypes exist.
            unsafe { entry(out) };
        }
        let delivered = out.len() - before;
        debug!("[ModuleLoader] {} delivered {} prototypes", path.display(), delivered);
        self.libraries.lock().push(library);
        Ok(delivered)
    }
}

impl PrototypeLoader for SharedLibraryLoader {
    fn name(&self) -> &str {
        "shared libraries"
    }

    fn load(&self, out: &mut Vec<Box<dyn ModuleBehavior>>) {
        let candidates = self.candidates();
        info!(
            "[ModuleLoader] Found {} libraries in {}",
            candidates.len(),
            self.directory.display()
        );
        for path in candidates {
            if let Err(e) = self.load_library(&path, out) {
                warn!("[ModuleLoader] {} Skipping it.", e);
            }
        }
    }

    fn take_libraries(&self) -> Vec<Library> {
        std::mem::take(&mut *self.libraries.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::factory::registry::ModuleFactory;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("modgraph-libs-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_directory_loads_nothing() {
        let loader = SharedLibraryLoader::new(std::env::temp_dir().join("modgraph-no-such-dir"));
        assert!(loader.candidates().is_empty());

        let factory = ModuleFactory::new();
        assert_eq!(factory.load(&loader), 0);
        assert!(factory.prototypes().is_empty());
    }

    #[test]
    fn test_only_library_files_are_candidates() {
        let dir = scratch_dir();
        let library = dir.join(format!("fake.{}", std::env::consts::DLL_EXTENSION));
        std::fs::write(&library, b"not a library").unwrap();
        std::fs::write(dir.join("notes.txt"), b"text").unwrap();

        let loader = SharedLibraryLoader::new(&dir);
        assert_eq!(loader.candidates(), vec![library.clone()]);

        let mut out = Vec::new();
        let err = loader.load_library(&library, &mut out).unwrap_err();
        assert_eq!(err.as_label(), "factory_library_open");
        assert!(out.is_empty());

        // the broken file is skipped, not fatal
        let factory = ModuleFactory::new();
        assert_eq!(factory.load(&loader), 0);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_library_without_entry_is_skipped() {
        // any real library lacking the entry symbol will do; libm is always present
        let libm = [
            "/lib/x86_64-linux-gnu/libm.so.6",
            "/usr/lib/x86_64-linux-gnu/libm.so.6",
            "/lib/aarch64-linux-gnu/libm.so.6",
            "/usr/lib/aarch64-linux-gnu/libm.so.6",
            "/lib64/libm.so.6",
            "/usr/lib64/libm.so.6",
            "/usr/lib/libm.so.6",
            "/lib/libm.so.6",
        ]
        .iter()
        .map(|p| PathBuf::from(*p))
        .find(|p| p.exists());
        let libm = match libm {
            Some(path) => path,
            None => return,
        };

        let dir = scratch_dir();
        let link = dir.join("libm.so");
        std::os::unix::fs::symlink(&libm, &link).unwrap();

        let loader = SharedLibraryLoader::new(&dir);
        let mut out = Vec::new();
        assert_eq!(
            loader.load_library(&link, &mut out).unwrap_err(),
            FactoryError::EntryMissing {
                path: link.display().to_string(),
                symbol: ENTRY_SYMBOL.to_string(),
            }
        );
        assert!(loader.take_libraries().is_empty());

        let factory = ModuleFactory::new();
        assert_eq!(factory.load(&loader), 0);
        let _ = std::fs::remove_dir_all(dir);
    }
}
