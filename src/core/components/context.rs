use crate::core::components::module::Module;
use crate::core::conditions::{Condition, ConditionSet};
use crate::core::connections::{Connector, DataType, Direction};
use crate::core::error::{ModuleError, PropertyError};
use crate::core::properties::{Property, PropertyGroup};
use std::sync::{Arc, Weak};

/// Collects the connectors a behavior declares during `initialize`
pub struct ConnectorSetup {
    module: Weak<Module>,
    module_name: String,
    inputs: Vec<Arc<Connector>>,
    outputs: Vec<Arc<Connector>>,
}

impl ConnectorSetup {
    pub(crate) fn new(module: Weak<Module>, module_name: &str) -> Self {
        Self {
            module,
            module_name: module_name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn add_input(&mut self, name: &str, description: &str, data_type: DataType) -> Result<Arc<Connector>, ModuleError> {
        self.add(name, description, Direction::Input, data_type)
    }

    pub fn add_output(&mut self, name: &str, description: &str, data_type: DataType) -> Result<Arc<Connector>, ModuleError> {
        self.add(name, description, Direction::Output, data_type)
    }

    fn add(
        &mut self,
        name: &str,
        description: &str,
        direction: Direction,
        data_type: DataType,
    ) -> Result<Arc<Connector>, ModuleError> {
        if name.is_empty() || name.contains(&[',', '(', ')'][..]) {
            return Err(PropertyError::NameMalformed {
                name: name.to_string(),
            }
            .into());
        }
        if self.inputs.iter().chain(self.outputs.iter()).any(|c| c.name() == name) {
            return Err(ModuleError::NameNotUnique {
                module: self.module_name.clone(),
                name: name.to_string(),
            });
        }

        let connector = Connector::new(
            self.module.clone(),
            &self.module_name,
            name,
            description,
            direction,
            data_type,
        );
        match direction {
            Direction::Input => self.inputs.push(Arc::clone(&connector)),
            Direction::Output => self.outputs.push(Arc::clone(&connector)),
        }
        Ok(connector)
    }

    pub(crate) fn into_parts(self) -> (Vec<Arc<Connector>>, Vec<Arc<Connector>>) {
        (self.inputs, self.outputs)
    }
}

/// Handle passed to `module_main`.
///
/// Owns the module's wait set: shutdown, every input's data-changed condition
/// and the property group's update condition. The set latches, so an event
/// fired while the module was busy is not lost.
pub struct ModuleContext {
    module: Arc<Module>,
    state: ConditionSet,
}

impl ModuleContext {
    pub(crate) fn new(module: Arc<Module>) -> Self {
        let state = ConditionSet::resettable(true);
        state.add(module.shutdown_condition());
        state.add(module.properties().update_condition());
        for input in module.inputs() {
            state.add(input.data_changed_condition());
        }
        if module.is_shutdown_requested() {
            state.notify();
        }
        Self { module, state }
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// Mark the module ready; wakes everyone waiting for ready-or-crashed
    pub fn ready(&self) {
        self.module.set_ready();
    }

    /// Block until shutdown is requested, an input changes or a property changes
    pub fn wait(&self) {
        self.state.wait();
    }

    /// Add another condition to the wait set
    pub fn wait_also_on(&self, condition: Arc<Condition>) {
        self.state.add(condition);
    }

    pub fn should_stop(&self) -> bool {
        self.module.is_shutdown_requested()
    }

    /// Value of the standard `active` property
    pub fn is_active(&self) -> bool {
        self.module.is_active()
    }

    pub fn input(&self, name: &str) -> Result<Arc<Connector>, ModuleError> {
        self.module.input(name)
    }

    pub fn output(&self, name: &str) -> Result<Arc<Connector>, ModuleError> {
        self.module.output(name)
    }

    pub fn properties(&self) -> &Arc<PropertyGroup> {
        self.module.properties()
    }

    pub fn information(&self) -> &Arc<PropertyGroup> {
        self.module.information()
    }

    pub fn property(&self, path: &str) -> Result<Arc<Property>, PropertyError> {
        self.module.properties().get_property(path)
    }
}
