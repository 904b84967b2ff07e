//! Small behaviors shared by unit tests.

use crate::core::components::context::{ConnectorSetup, ModuleContext};
use crate::core::components::traits::{ModuleBehavior, Requirement};
use crate::core::connections::DataType;
use crate::core::error::{ModuleError, PropertyError};
use crate::core::properties::PropertyGroup;

/// Outputs `out: f64` and `count: i32`
pub struct Source {
    name: String,
}

impl Source {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

impl ModuleBehavior for Source {
    fn name(&self) -> &str {
        &self.name
    }

    fn factory(&self) -> Box<dyn ModuleBehavior> {
        Box::new(Source::new(&self.name))
    }

    fn connectors(&mut self, setup: &mut ConnectorSetup) -> Result<(), ModuleError> {
        setup.add_output("out", "values", DataType::of::<f64>())?;
        setup.add_output("count", "counter", DataType::of::<i32>())?;
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

/// Input `in: f64`, parameter `threshold`, information `updates`
pub struct Sink {
    name: String,
}

impl Sink {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

impl ModuleBehavior for Sink {
    fn name(&self) -> &str {
        &self.name
    }

    fn factory(&self) -> Box<dyn ModuleBehavior> {
        Box::new(Sink::new(&self.name))
    }

    fn connectors(&mut self, setup: &mut ConnectorSetup) -> Result<(), ModuleError> {
        setup.add_input("in", "values", DataType::of::<f64>())?;
        Ok(())
    }

    fn properties(&mut self, properties: &PropertyGroup, information: &PropertyGroup) -> Result<(), PropertyError> {
        properties.add_property("threshold", "cut-off", 0.5)?;
        information.add_property("updates", "number of wake-ups", 0)?;
        Ok(())
    }

    fn module_main(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        let updates = ctx.information().get_property("updates")?;
        ctx.ready();
        loop {
            ctx.wait();
            if ctx.should_stop() {
                return Ok(());
            }
            let count = updates.get_as::<i32>().unwrap_or(0);
            updates.set(count + 1);
        }
    }
}

struct Never;

impl Requirement for Never {
    fn is_met(&self) -> bool {
        false
    }

    fn description(&self) -> String {
        "never satisfied".to_string()
    }
}

/// Faults in one of several ways
pub struct Failing {
    panics: bool,
    unmet: bool,
}

impl Failing {
    pub fn panicking() -> Self {
        Self {
            panics: true,
            unmet: false,
        }
    }

    pub fn erroring() -> Self {
        Self {
            panics: false,
            unmet: false,
        }
    }

    pub fn unmet_requirement() -> Self {
        Self {
            panics: false,
            unmet: true,
        }
    }
}

impl ModuleBehavior for Failing {
    fn name(&self) -> &str {
        "Failing"
    }

    fn factory(&self) -> Box<dyn ModuleBehavior> {
        Box::new(Failing {
            panics: self.panics,
            unmet: self.unmet,
        })
    }

    fn connectors(&mut self, setup: &mut ConnectorSetup) -> Result<(), ModuleError> {
        setup.add_input("in", "anything", DataType::any())?;
        Ok(())
    }

    fn requirements(&self) -> Vec<Box<dyn Requirement>> {
        if self.unmet {
            vec![Box::new(Never)]
        } else {
            Vec::new()
        }
    }

    fn module_main(&mut self, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        if self.panics {
            panic!("boom");
        }
        Err(ModuleError::failed("Failing", "gave up"))
    }
}
