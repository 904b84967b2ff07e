//! Builds a three-module pipeline, feeds it a few values and prints the
//! resulting project file.
//!
//! Run with `RUST_LOG=debug` to watch modules start, connect and stop.

use log::info;
use modgraph::core::combiner::ProjectFileCombiner;
use modgraph::core::components::{ConnectorSetup, ModuleContext};
use modgraph::core::factory::StaticLoader;
use modgraph::core::properties::PropertyGroup;
use modgraph::{DataType, Kernel, KernelConfig, ModuleBehavior, ModuleError, PropertyError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct Counter;

impl ModuleBehavior for Counter {
    fn name(&self) -> &str {
        "Counter"
    }

    fn description(&self) -> &str {
        "Publishes its start value"
    }

    fn factory(&self) -> Box<dyn ModuleBehavior> {
        Box::new(Counter)
    }

    fn connectors(&mut self, setup: &mut ConnectorSetup) -> Result<(), ModuleError> {
        setup.add_output("value", "current count", DataType::of::<i32>())?;
        Ok(())
    }

    fn properties(&mut self, properties: &PropertyGroup, _information: &PropertyGroup) -> Result<(), PropertyError> {
        let start = properties.add_property("start", "first value", 1)?;
        start.set_min(0);
        Ok(())
    }

    fn module_main(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        let start = ctx.property("start")?;
        let out = ctx.output("value")?;
        ctx.ready();
        loop {
            out.update_data(start.get_as::<i32>().unwrap_or_default());
            ctx.wait();
            if ctx.should_stop() {
                return Ok(());
            }
        }
    }
}

struct Square;

impl ModuleBehavior for Square {
    fn name(&self) -> &str {
        "Square"
    }

    fn factory(&self) -> Box<dyn ModuleBehavior> {
        Box::new(Square)
    }

    fn connectors(&mut self, setup: &mut ConnectorSetup) -> Result<(), ModuleError> {
        setup.add_input("in", "number", DataType::of::<i32>())?;
        setup.add_output("out", "number squared", DataType::of::<i32>())?;
        Ok(())
    }

    fn module_main(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        let input = ctx.input("in")?;
        let out = ctx.output("out")?;
        ctx.ready();
        loop {
            ctx.wait();
            if ctx.should_stop() {
                return Ok(());
            }
            if let Some(v) = input.data::<i32>() {
                out.update_data(*v * *v);
            }
        }
    }
}

struct Printer;

impl ModuleBehavior for Printer {
    fn name(&self) -> &str {
        "Printer"
    }

    fn factory(&self) -> Box<dyn ModuleBehavior> {
        Box::new(Printer)
    }

    fn connectors(&mut self, setup: &mut ConnectorSetup) -> Result<(), ModuleError> {
        setup.add_input("in", "anything printable", DataType::of::<i32>())?;
        Ok(())
    }

    fn module_main(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        let input = ctx.input("in")?;
        ctx.ready();
        loop {
            ctx.wait();
            if ctx.should_stop() {
                return Ok(());
            }
            if let Some(v) = input.data::<i32>() {
                println!("Printer received {}", v);
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let kernel = Kernel::new(KernelConfig::default())?;
    kernel.load_prototypes(&StaticLoader::new("demo", |out: &mut Vec<Box<dyn ModuleBehavior>>| {
        out.push(Box::new(Counter));
        out.push(Box::new(Square));
        out.push(Box::new(Printer));
    }));

    let root = Arc::clone(kernel.root());
    let counter = kernel.factory().create_by_name("Counter")?;
    root.add(&counter, true)?;
    let square = root.apply_module(&counter, "Square")?;
    root.apply_module(&square, "Printer")?;

    let start = counter.properties().get_property("start")?;
    for value in 2..=5 {
        start.set(value);
        thread::sleep(Duration::from_millis(50));
    }
    if !start.set(-3) {
        info!("[Demo] Counter rejected a negative start value");
    }

    println!("--- project ---");
    ProjectFileCombiner::new(Arc::clone(&root)).save(&mut std::io::stdout())?;

    kernel.shutdown();
    Ok(())
}
