use crate::core::components::context::{ConnectorSetup, ModuleContext};
use crate::core::components::traits::{ModuleBehavior, ModuleType};
use crate::core::connections::DataType;
use crate::core::error::{ModuleError, PropertyError};
use crate::core::properties::PropertyGroup;
use log::debug;
use std::path::PathBuf;

/// Prototype name used for `DATA` records
pub const DATA_MODULE_NAME: &str = "Data Module";

/// Property holding the dataset location
pub const FILENAME_PROPERTY: &str = "filename";

/// Publishes the configured dataset path on its `out` connector.
///
/// Parsing the dataset is left to downstream modules; this module only owns
/// the location and republishes it whenever `filename` changes.
#[derive(Default)]
pub struct DataModule;

impl ModuleBehavior for DataModule {
    fn name(&self) -> &str {
        DATA_MODULE_NAME
    }

    fn description(&self) -> &str {
        "Provides a dataset loaded from a file"
    }

    fn module_type(&self) -> ModuleType {
        ModuleType::Data
    }

    fn factory(&self) -> Box<dyn ModuleBehavior> {
        Box::new(DataModule)
    }

    fn connectors(&mut self, setup: &mut ConnectorSetup) -> Result<(), ModuleError> {
        setup.add_output("out", "Location of the loaded dataset", DataType::of::<PathBuf>())?;
        Ok(())
    }

    fn properties(&mut self, properties: &PropertyGroup, _information: &PropertyGroup) -> Result<(), PropertyError> {
        properties.add_property(FILENAME_PROPERTY, "File to load", PathBuf::new())?;
        Ok(())
    }

    fn module_main(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        let filename = ctx.property(FILENAME_PROPERTY)?;
        let out = ctx.output("out")?;
        let mut published: Option<PathBuf> = None;
        ctx.ready();

        loop {
            let current = filename.get_as::<PathBuf>().unwrap_or_default();
            if !current.as_os_str().is_empty() && published.as_ref() != Some(&current) {
                debug!("[Module:{}] Publishing {}", DATA_MODULE_NAME, current.display());
                out.update_data(current.clone());
                published = Some(current);
            }

            ctx.wait();
            if ctx.should_stop() {
                return Ok(());
            }
        }
    }
}
