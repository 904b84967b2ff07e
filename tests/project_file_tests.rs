use modgraph::core::{
    combiner::{records::Endpoint, Combiner, ProjectFileCombiner, ProjectRecord},
    components::{ConnectorSetup, ModuleBehavior, ModuleContext, DATA_MODULE_NAME},
    connections::DataType,
    error::{ModuleError, PropertyError},
    execution::{Kernel, KernelConfig},
    factory::StaticLoader,
    properties::{PropertyGroup, PropertyPurpose},
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Output `out`, no parameters besides the standard ones
struct P1;

impl ModuleBehavior for P1 {
    fn name(&self) -> &str {
        "P1"
    }

    fn factory(&self) -> Box<dyn ModuleBehavior> {
        Box::new(P1)
    }

    fn connectors(&mut self, setup: &mut ConnectorSetup) -> Result<(), ModuleError> {
        setup.add_output("out", "numbers", DataType::of::<f64>())?;
        Ok(())
    }

    fn module_main(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        ctx.ready();
        while !ctx.should_stop() {
            ctx.wait();
        }
        Ok(())
    }
}

/// Input `in` with a nested parameter group
struct P2;

impl ModuleBehavior for P2 {
    fn name(&self) -> &str {
        "P2"
    }

    fn factory(&self) -> Box<dyn ModuleBehavior> {
        Box::new(P2)
    }

    fn connectors(&mut self, setup: &mut ConnectorSetup) -> Result<(), ModuleError> {
        setup.add_input("in", "numbers", DataType::of::<f64>())?;
        Ok(())
    }

    fn properties(&mut self, properties: &PropertyGroup, information: &PropertyGroup) -> Result<(), PropertyError> {
        properties.add_property("threshold", "cut-off", 0.1)?;
        let view = properties.add_group("view", "display settings")?;
        view.add_property("opacity", "alpha", 1.0)?;
        view.add_property("label", "caption", "none".to_string())?;
        information.add_property("seen", "values received", 0)?;
        Ok(())
    }

    fn module_main(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        ctx.ready();
        while !ctx.should_stop() {
            ctx.wait();
        }
        Ok(())
    }
}

/// Input `in`; keeps a running count as an information value in its main group
struct Tally;

impl ModuleBehavior for Tally {
    fn name(&self) -> &str {
        "Tally"
    }

    fn factory(&self) -> Box<dyn ModuleBehavior> {
        Box::new(Tally)
    }

    fn connectors(&mut self, setup: &mut ConnectorSetup) -> Result<(), ModuleError> {
        setup.add_input("in", "numbers", DataType::of::<f64>())?;
        Ok(())
    }

    fn properties(&mut self, properties: &PropertyGroup, _information: &PropertyGroup) -> Result<(), PropertyError> {
        properties.add_property("rate", "samples per second", 1.0)?;
        let count = properties.add_property("count", "values counted", 0)?;
        count.set_purpose(PropertyPurpose::Information);
        Ok(())
    }

    fn module_main(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        ctx.ready();
        while !ctx.should_stop() {
            ctx.wait();
        }
        Ok(())
    }
}

/// Output `out`; gives up before becoming ready
struct Broken;

impl ModuleBehavior for Broken {
    fn name(&self) -> &str {
        "Broken"
    }

    fn factory(&self) -> Box<dyn ModuleBehavior> {
        Box::new(Broken)
    }

    fn connectors(&mut self, setup: &mut ConnectorSetup) -> Result<(), ModuleError> {
        setup.add_output("out", "numbers", DataType::of::<f64>())?;
        Ok(())
    }

    fn properties(&mut self, properties: &PropertyGroup, _information: &PropertyGroup) -> Result<(), PropertyError> {
        properties.add_property("level", "output level", 1)?;
        Ok(())
    }

    fn module_main(&mut self, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        Err(ModuleError::failed("Broken", "no device"))
    }
}

fn kernel() -> Kernel {
    let _ = env_logger::builder().is_test(true).try_init();
    let kernel = Kernel::new(KernelConfig::new().with_logging(false)).unwrap();
    kernel.load_prototypes(&StaticLoader::new("project tests", |out: &mut Vec<Box<dyn ModuleBehavior>>| {
        out.push(Box::new(P1));
        out.push(Box::new(P2));
        out.push(Box::new(Tally));
        out.push(Box::new(Broken));
    }));
    kernel
}

fn temp_file() -> PathBuf {
    std::env::temp_dir().join(format!("modgraph-{}.owproj", uuid::Uuid::new_v4()))
}

fn saved(kernel: &Kernel) -> String {
    let mut buffer = Vec::new();
    ProjectFileCombiner::new(Arc::clone(kernel.root())).save(&mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

fn record_set(text: &str) -> BTreeSet<String> {
    text.lines()
        .filter_map(|l| ProjectRecord::parse_line(l).unwrap())
        .map(|r| r.to_string())
        .collect()
}

const PROJECT: &str = "\
// two modules and one edge
MODULE:0:P1
MODULE:1:P2

CONNECTION:(0,out)->(1,in)
PROPERTY:(1,threshold)=0.5
PROPERTY:(1,view/opacity)=0.25
PROPERTY:(1,view/label)=a: b=c
";

#[test]
fn test_load_builds_graph() {
    let kernel = kernel();
    let mut combiner = ProjectFileCombiner::new(Arc::clone(kernel.root()));
    assert_eq!(combiner.parse_str(PROJECT), 6);
    let report = combiner.apply();
    assert!(report.is_clean(), "{:?}", report);

    let p1 = &report.modules[&0];
    let p2 = &report.modules[&1];
    assert_eq!(kernel.root().len(), 2);
    assert!(p1.output("out").unwrap().is_connected_to(&p2.input("in").unwrap()).unwrap());

    let properties = p2.properties();
    assert_eq!(properties.get_property("threshold").unwrap().get_as::<f64>(), Some(0.5));
    assert_eq!(properties.get_property("view/opacity").unwrap().get_as::<f64>(), Some(0.25));
    assert_eq!(properties.get_property("view/label").unwrap().get_as_string(), "a: b=c");
    kernel.shutdown();
}

#[test]
fn test_save_then_reload_gives_same_records() {
    let kernel = kernel();
    let mut combiner = ProjectFileCombiner::new(Arc::clone(kernel.root()));
    combiner.parse_str(PROJECT);
    assert!(combiner.apply().is_clean());

    let first = saved(&kernel);
    let first_records = record_set(&first);
    for line in PROJECT.lines().filter(|l| !l.is_empty() && !l.starts_with("//")) {
        assert!(first_records.contains(line), "missing {} in\n{}", line, first);
    }
    assert!(!first.contains("seen"), "information properties must not be saved:\n{}", first);

    let path = temp_file();
    std::fs::write(&path, &first).unwrap();
    kernel.shutdown();

    let other = self::kernel();
    let report = other.load_project(&path).unwrap();
    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(record_set(&saved(&other)), first_records);
    other.shutdown();
    let _ = std::fs::remove_file(path);
}

#[test]
fn test_data_record_uses_data_module() {
    let kernel = kernel();
    let mut combiner = ProjectFileCombiner::new(Arc::clone(kernel.root()));
    combiner.parse_str("DATA:4:/data/subject one.nii\n");
    let report = combiner.apply();
    assert!(report.is_clean(), "{:?}", report);

    let data = &report.modules[&4];
    assert_eq!(data.name(), DATA_MODULE_NAME);
    assert_eq!(
        data.properties().get_property("filename").unwrap().get_as::<PathBuf>(),
        Some(PathBuf::from("/data/subject one.nii"))
    );
    assert!(saved(&kernel).lines().any(|l| l == "DATA:0:/data/subject one.nii"));
    kernel.shutdown();
}

#[test]
fn test_partial_load_reports_problems() {
    let kernel = kernel();
    let mut combiner = ProjectFileCombiner::new(Arc::clone(kernel.root()));
    combiner.parse_str(
        "MODULE:0:P1\n\
         MODULE:1:Unknown\n\
         MODULE:2:P2\n\
         MODULE:2:P1\n\
         CONNECTION:(0,out)->(1,in)\n\
         CONNECTION:(0,nope)->(2,in)\n\
         PROPERTY:(2,seen)=5\n\
         PROPERTY:(2,view/missing)=1\n\
         NOT A RECORD\n",
    );
    combiner.add_record(ProjectRecord::Connection {
        from: Endpoint::new(0, "out"),
        to: Endpoint::new(2, "in"),
    });

    let report = combiner.apply();
    // unknown prototype, duplicate id, malformed line
    assert_eq!(report.errors.len(), 3, "{:?}", report.errors);
    // unknown module, missing connector, two unknown properties ("seen" lives in the information group)
    assert_eq!(report.warnings.len(), 4, "{:?}", report.warnings);
    assert_eq!(report.modules.len(), 2);
    assert!(report.modules[&2].input("in").unwrap().is_connected());
    kernel.shutdown();
}

#[test]
fn test_multi_line_values_survive_save_and_reload() {
    let kernel = kernel();
    let mut combiner = ProjectFileCombiner::new(Arc::clone(kernel.root()));
    combiner.parse_str(PROJECT);
    let report = combiner.apply();
    assert!(report.is_clean(), "{:?}", report);
    let name = report.modules[&0].properties().get_property("Name").unwrap();
    assert!(name.set_as_string("line1\nline2\r\\end"));

    let text = saved(&kernel);
    assert!(text.lines().all(|l| ProjectRecord::parse_line(l).is_ok()), "{}", text);
    assert!(!text.lines().any(|l| l.starts_with("line2")), "{}", text);

    let path = temp_file();
    std::fs::write(&path, &text).unwrap();
    kernel.shutdown();

    let other = self::kernel();
    let report = other.load_project(&path).unwrap();
    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(
        report.modules[&0].properties().get_property("Name").unwrap().get_as_string(),
        "line1\nline2\r\\end"
    );
    other.shutdown();
    let _ = std::fs::remove_file(path);
}

#[test]
fn test_information_properties_are_not_loaded() {
    let kernel = kernel();
    let mut combiner = ProjectFileCombiner::new(Arc::clone(kernel.root()));
    combiner.parse_str("MODULE:0:Tally\nPROPERTY:(0,count)=7\nPROPERTY:(0,rate)=2\n");
    let report = combiner.apply();

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.warnings.len(), 1, "{:?}", report.warnings);
    assert!(report.warnings[0].contains("information"), "{:?}", report.warnings);

    let properties = report.modules[&0].properties();
    assert_eq!(properties.get_property("count").unwrap().get_as::<i32>(), Some(0));
    assert_eq!(properties.get_property("rate").unwrap().get_as::<f64>(), Some(2.0));
    assert!(!saved(&kernel).contains("count"));
    kernel.shutdown();
}

#[test]
fn test_module_crashing_during_load_is_skipped() {
    let kernel = kernel();
    let mut combiner = ProjectFileCombiner::new(Arc::clone(kernel.root()));
    combiner.parse_str(
        "MODULE:0:Broken\n\
         MODULE:1:Tally\n\
         PROPERTY:(0,level)=3\n\
         PROPERTY:(1,rate)=4\n\
         CONNECTION:(0,out)->(1,in)\n",
    );
    let report = combiner.apply();

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    // the crash itself, then its property and its connection
    assert_eq!(report.warnings.len(), 3, "{:?}", report.warnings);
    assert!(report.warnings[0].contains("crashed"), "{:?}", report.warnings);
    assert_eq!(report.modules.keys().copied().collect::<Vec<_>>(), vec![1]);

    let tally = &report.modules[&1];
    assert_eq!(tally.properties().get_property("rate").unwrap().get_as::<f64>(), Some(4.0));
    assert!(!tally.input("in").unwrap().is_connected());

    let broken = kernel
        .root()
        .modules()
        .into_iter()
        .find(|m| m.name() == "Broken")
        .unwrap();
    assert!(broken.is_crashed());
    assert_eq!(broken.properties().get_property("level").unwrap().get_as::<i32>(), Some(1));
    assert!(!kernel.root().module().is_crashed());
    kernel.shutdown();
}

#[test]
fn test_missing_file_is_io_error() {
    let kernel = kernel();
    assert!(kernel.load_project(&temp_file()).is_err());
    kernel.shutdown();
}
