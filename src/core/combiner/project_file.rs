use super::records::{Endpoint, ProjectRecord};
use super::Combiner;
use crate::core::components::container::ModuleContainer;
use crate::core::components::data_module::{DATA_MODULE_NAME, FILENAME_PROPERTY};
use crate::core::components::module::Module;
use crate::core::components::traits::ModuleType;
use crate::core::error::FactoryError;
use crate::core::properties::PropertyPurpose;
use crate::core::types::ModuleId;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

/// What went wrong while replaying a project file
#[derive(Debug, Default)]
pub struct ProjectLoadReport {
    /// Records that could not be turned into modules at all
    pub errors: Vec<String>,
    /// Records that were skipped
    pub warnings: Vec<String>,
    /// Live module for every file-local id that loaded successfully
    pub modules: BTreeMap<u32, Arc<Module>>,
}

impl ProjectLoadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    fn error(&mut self, message: String) {
        error!("[ProjectLoader] {}", message);
        self.errors.push(message);
    }

    fn warning(&mut self, message: String) {
        warn!("[ProjectLoader] {}", message);
        self.warnings.push(message);
    }
}

#[derive(Debug, Clone)]
enum ModuleDecl {
    Prototype(String),
    Data(String),
}

/// Replays and writes the module graph of a container in the project-file format.
///
/// Records are applied in a fixed order regardless of their order in the file:
/// modules are created and started, then awaited, then properties are set and
/// finally connections are made, so that modules see their parameters before
/// data flows along the new edges.
pub struct ProjectFileCombiner {
    container: Arc<ModuleContainer>,
    modules: Vec<(u32, ModuleDecl)>,
    properties: Vec<(Endpoint, String)>,
    connections: Vec<(Endpoint, Endpoint)>,
    parse_errors: Vec<String>,
}

impl ProjectFileCombiner {
    pub fn new(container: Arc<ModuleContainer>) -> Self {
        Self {
            container,
            modules: Vec::new(),
            properties: Vec::new(),
            connections: Vec::new(),
            parse_errors: Vec::new(),
        }
    }

    /// Parse project text; malformed lines are remembered and reported by `apply`
    pub fn parse_str(&mut self, text: &str) -> usize {
        let mut accepted = 0;
        for (index, line) in text.lines().enumerate() {
            match ProjectRecord::parse_line(line) {
                Ok(Some(record)) => {
                    self.add_record(record);
                    accepted += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("[ProjectLoader] Line {}: {}", index + 1, e);
                    self.parse_errors.push(format!("line {}: {}", index + 1, e));
                }
            }
        }
        accepted
    }

    pub fn load_file(&mut self, path: &Path) -> io::Result<usize> {
        let text = std::fs::read_to_string(path)?;
        info!("[ProjectLoader] Loading {}", path.display());
        Ok(self.parse_str(&text))
    }

    pub fn add_record(&mut self, record: ProjectRecord) {
        match record {
            ProjectRecord::Module { id, prototype } => self.modules.push((id, ModuleDecl::Prototype(prototype))),
            ProjectRecord::Data { id, filename } => self.modules.push((id, ModuleDecl::Data(filename))),
            ProjectRecord::Connection { from, to } => self.connections.push((from, to)),
            ProjectRecord::Property { target, value } => self.properties.push((target, value)),
        }
    }

    /// Parsed records in application order
    pub fn records(&self) -> Vec<ProjectRecord> {
        let modules = self.modules.iter().map(|(id, decl)| match decl {
            ModuleDecl::Prototype(prototype) => ProjectRecord::Module {
                id: *id,
                prototype: prototype.clone(),
            },
            ModuleDecl::Data(filename) => ProjectRecord::Data {
                id: *id,
                filename: filename.clone(),
            },
        });
        let properties = self.properties.iter().map(|(target, value)| ProjectRecord::Property {
            target: target.clone(),
            value: value.clone(),
        });
        let connections = self.connections.iter().map(|(from, to)| ProjectRecord::Connection {
            from: from.clone(),
            to: to.clone(),
        });
        modules.chain(properties).chain(connections).collect()
    }

    fn create(&self, decl: &ModuleDecl) -> Result<Arc<Module>, FactoryError> {
        let factory = self.container.factory();
        match decl {
            ModuleDecl::Prototype(name) => factory.create_by_name(name),
            ModuleDecl::Data(filename) => {
                let module = factory.create_by_name(DATA_MODULE_NAME)?;
                let property = module
                    .properties()
                    .get_property(FILENAME_PROPERTY)
                    .map_err(crate::core::error::ModuleError::from)?;
                if !property.set_as_string(filename) {
                    warn!("[ProjectLoader] Data module rejected filename \"{}\"", filename);
                }
                Ok(module)
            }
        }
    }

    fn add_modules(&self, report: &mut ProjectLoadReport) {
        for (id, decl) in &self.modules {
            if report.modules.contains_key(id) {
                report.error(format!("module id {} is used twice; ignoring the second one", id));
                continue;
            }
            let module = match self.create(decl) {
                Ok(module) => module,
                Err(e) => {
                    report.error(format!("module {}: {}", id, e));
                    continue;
                }
            };
            if let Err(e) = self.container.add(&module, true) {
                report.error(format!("module {}: {}", id, e));
                continue;
            }
            report.modules.insert(*id, module);
        }
    }

    fn await_modules(&self, report: &mut ProjectLoadReport) {
        let mut crashed = Vec::new();
        for (id, module) in &report.modules {
            if module.is_running() {
                module.wait_ready_or_crashed();
            }
            if module.is_crashed() {
                crashed.push(*id);
            }
        }
        for id in crashed {
            report.modules.remove(&id);
            report.warning(format!(
                "module {} crashed while starting; skipping its properties and connections",
                id
            ));
        }
    }

    fn apply_properties(&self, report: &mut ProjectLoadReport) {
        for (target, value) in &self.properties {
            let module = match report.modules.get(&target.module) {
                Some(module) => Arc::clone(module),
                None => {
                    report.warning(format!("property {}: no module with id {}", target, target.module));
                    continue;
                }
            };
            let property = match module.properties().get_property(&target.name) {
                Ok(property) => property,
                Err(e) => {
                    report.warning(format!("property {}: {}", target, e));
                    continue;
                }
            };
            if property.purpose() == PropertyPurpose::Information {
                report.warning(format!("property {} is an information property; skipping", target));
                continue;
            }
            if !property.set_as_string(value) {
                report.warning(format!("property {}: can't set \"{}\"", target, value));
            }
        }
    }

    fn apply_connections(&self, report: &mut ProjectLoadReport) {
        for (from, to) in &self.connections {
            let (source, target) = match (report.modules.get(&from.module), report.modules.get(&to.module)) {
                (Some(source), Some(target)) => (Arc::clone(source), Arc::clone(target)),
                _ => {
                    report.warning(format!("connection {}->{}: unknown module id", from, to));
                    continue;
                }
            };
            let connected = source
                .output(&from.name)
                .and_then(|output| Ok((output, target.input(&to.name)?)))
                .and_then(|(output, input)| Ok(output.connect(&input, false)?));
            if let Err(e) = connected {
                report.warning(format!("connection {}->{}: {}", from, to, e));
            }
        }
    }

    /// Write every module of the container, its parameters and all its output edges
    pub fn save<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let modules: Vec<Arc<Module>> = self
            .container
            .modules()
            .into_iter()
            .filter(|m| {
                if m.module_type() == ModuleType::Container {
                    warn!("[ProjectLoader] Nested container \"{}\" can't be saved", m.name());
                    return false;
                }
                true
            })
            .collect();
        let ids: HashMap<ModuleId, u32> = modules
            .iter()
            .enumerate()
            .map(|(index, m)| (m.id(), index as u32))
            .collect();

        for (index, module) in modules.iter().enumerate() {
            let id = index as u32;
            let is_data = module.module_type() == ModuleType::Data;
            let record = if is_data {
                let filename = module
                    .properties()
                    .get_property(FILENAME_PROPERTY)
                    .map(|p| p.get_as_string())
                    .unwrap_or_default();
                ProjectRecord::Data { id, filename }
            } else {
                ProjectRecord::Module {
                    id,
                    prototype: module.name().to_string(),
                }
            };
            writeln!(out, "{}", record)?;

            for (path, property) in module.properties().flatten() {
                if property.purpose() == PropertyPurpose::Information || (is_data && path == FILENAME_PROPERTY) {
                    continue;
                }
                let record = ProjectRecord::Property {
                    target: Endpoint::new(id, &path),
                    value: property.get_as_string(),
                };
                writeln!(out, "{}", record)?;
            }
        }

        for (index, module) in modules.iter().enumerate() {
            for output in module.outputs() {
                for input in output.connected() {
                    let peer = match input.module().and_then(|m| ids.get(&m.id()).copied()) {
                        Some(peer) => peer,
                        None => {
                            debug!(
                                "[ProjectLoader] Skipping edge {}->{} leaving the container",
                                output.canonical_name(),
                                input.canonical_name()
                            );
                            continue;
                        }
                    };
                    let record = ProjectRecord::Connection {
                        from: Endpoint::new(index as u32, output.name()),
                        to: Endpoint::new(peer, input.name()),
                    };
                    writeln!(out, "{}", record)?;
                }
            }
        }
        Ok(())
    }
}

impl Combiner for ProjectFileCombiner {
    type Outcome = ProjectLoadReport;

    fn apply(&self) -> ProjectLoadReport {
        let mut report = ProjectLoadReport::default();
        for e in &self.parse_errors {
            report.errors.push(e.clone());
        }

        self.add_modules(&mut report);
        self.await_modules(&mut report);
        self.apply_properties(&mut report);
        self.apply_connections(&mut report);

        info!(
            "[ProjectLoader] Loaded {} modules with {} errors and {} warnings",
            report.modules.len(),
            report.errors.len(),
            report.warnings.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::components::testing::{Sink, Source};
    use crate::core::factory::{BuiltinLoader, ModuleFactory};
    use std::collections::BTreeSet;

    fn root() -> Arc<ModuleContainer> {
        let factory = Arc::new(ModuleFactory::new());
        factory.load(&BuiltinLoader);
        factory.add_prototype(Box::new(Source::new("P1"))).unwrap();
        factory.add_prototype(Box::new(Sink::new("P2"))).unwrap();
        let root = ModuleContainer::new("Root", "", factory).unwrap();
        root.set_crash_if_module_crashes(false);
        root
    }

    const PROJECT: &str = "MODULE:0:P1\nMODULE:1:P2\nCONNECTION:(0,out)->(1,in)\nPROPERTY:(1,threshold)=0.5\n";

    #[test]
    fn test_apply_orders_properties_before_connections() {
        let root = root();
        let mut combiner = ProjectFileCombiner::new(Arc::clone(&root));
        assert_eq!(combiner.parse_str(PROJECT), 4);

        let report = combiner.apply();
        assert!(report.is_clean(), "{:?}", report);
        let m0 = &report.modules[&0];
        let m1 = &report.modules[&1];
        assert_eq!(m1.properties().get_property("threshold").unwrap().get_as::<f64>(), Some(0.5));
        assert!(m0
            .output("out")
            .unwrap()
            .is_connected_to(&m1.input("in").unwrap())
            .unwrap());
        root.stop();
    }

    #[test]
    fn test_save_reproduces_records() {
        let root = root();
        let mut combiner = ProjectFileCombiner::new(Arc::clone(&root));
        combiner.parse_str(PROJECT);
        combiner.apply();

        let mut saved = Vec::new();
        combiner.save(&mut saved).unwrap();
        let text = String::from_utf8(saved).unwrap();

        let records: BTreeSet<String> = text.lines().map(str::to_string).collect();
        for line in PROJECT.lines() {
            assert!(records.contains(line), "missing {} in\n{}", line, text);
        }
        root.stop();
    }

    #[test]
    fn test_bad_records_are_skipped() {
        let root = root();
        let mut combiner = ProjectFileCombiner::new(Arc::clone(&root));
        combiner.parse_str(
            "MODULE:0:P1\n\
             MODULE:1:Nope\n\
             MODULE:2:P2\n\
             garbage\n\
             PROPERTY:(2,missing)=1\n\
             PROPERTY:(2,threshold)=abc\n\
             CONNECTION:(0,count)->(2,in)\n\
             CONNECTION:(1,out)->(2,in)\n\
             CONNECTION:(0,out)->(2,in)\n",
        );

        let report = combiner.apply();
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.warnings.len(), 4);
        assert_eq!(report.modules.len(), 2);
        assert!(report.modules[&2].input("in").unwrap().is_connected());
        root.stop();
    }

    #[test]
    fn test_data_records() {
        let root = root();
        let mut combiner = ProjectFileCombiner::new(Arc::clone(&root));
        combiner.parse_str("DATA:0:/tmp/brain.nii\nMODULE:1:P2\n");
        let report = combiner.apply();
        assert!(report.is_clean(), "{:?}", report);

        let data = &report.modules[&0];
        assert_eq!(data.module_type(), ModuleType::Data);
        assert_eq!(
            data.properties().get_property(FILENAME_PROPERTY).unwrap().get_as_string(),
            "/tmp/brain.nii"
        );

        let mut saved = Vec::new();
        combiner.save(&mut saved).unwrap();
        let text = String::from_utf8(saved).unwrap();
        assert!(text.lines().any(|l| l == "DATA:0:/tmp/brain.nii"));
        root.stop();
    }
}
