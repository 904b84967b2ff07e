use crate::core::combiner::DisconnectCombiner;
use crate::core::components::container::ModuleContainer;
use crate::core::components::context::{ConnectorSetup, ModuleContext};
use crate::core::components::lifecycle::Lifecycle;
use crate::core::components::traits::{ModuleBehavior, ModuleType, Requirement};
use crate::core::conditions::{Condition, ConditionSet, Flag};
use crate::core::connections::Connector;
use crate::core::error::ModuleError;
use crate::core::properties::{Property, PropertyGroup, PropertyPurpose};
use crate::core::shared::SharedSequence;
use crate::core::signal::Signal;
use crate::core::types::ModuleId;
use log::{debug, error, warn};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

/// A crashed module and the fault that crashed it
pub type ModuleErrorEvent = (Arc<Module>, Arc<ModuleError>);

/// Runtime wrapper around a [`ModuleBehavior`].
///
/// Owns connectors, properties and lifecycle flags, and runs the behavior's
/// `module_main` on a dedicated thread. Faults escaping the thread mark the
/// module crashed, disconnect every connector and are emitted on
/// [`Module::error_signal`].
pub struct Module {
    id: ModuleId,
    name: String,
    description: String,
    module_type: ModuleType,
    self_ref: Weak<Module>,
    behavior: Mutex<Box<dyn ModuleBehavior>>,
    properties: Arc<PropertyGroup>,
    information: Arc<PropertyGroup>,
    active: Arc<Property>,
    inputs: SharedSequence<Arc<Connector>>,
    outputs: SharedSequence<Arc<Connector>>,
    requirements: Mutex<Vec<Box<dyn Requirement>>>,

    initialized: Flag<bool>,
    associated: Flag<bool>,
    ready: Flag<bool>,
    crashed: Flag<bool>,
    running: Flag<bool>,
    shutdown: Flag<bool>,
    stopped: Flag<bool>,
    ready_or_crashed: ConditionSet,

    container: RwLock<Weak<ModuleContainer>>,
    local_path: RwLock<PathBuf>,
    thread: Mutex<Option<JoinHandle<()>>>,
    last_error: RwLock<Option<Arc<ModuleError>>>,
    ready_signal: Signal<Arc<Module>>,
    error_signal: Signal<ModuleErrorEvent>,
}

impl Module {
    /// Wrap a behavior. The module still has to be initialized.
    pub fn new(behavior: Box<dyn ModuleBehavior>) -> Result<Arc<Module>, ModuleError> {
        let name = behavior.name().to_string();
        let description = behavior.description().to_string();
        let module_type = behavior.module_type();

        let properties = PropertyGroup::new("Properties", "Parameters of the module")?;
        properties.add_property("Name", "Display name of this module instance", name.as_str())?;
        let active = properties.add_property("active", "Whether the module computes anything", true)?;
        let information = PropertyGroup::new("Information", "Values computed by the module")?;
        information.set_purpose(PropertyPurpose::Information);

        let ready = Flag::new(false);
        let crashed = Flag::new(false);
        let ready_or_crashed = ConditionSet::new();
        ready_or_crashed.add(ready.condition());
        ready_or_crashed.add(crashed.condition());

        Ok(Arc::new_cyclic(|self_ref| Module {
            id: ModuleId::new(),
            name,
            description,
            module_type,
            self_ref: self_ref.clone(),
            behavior: Mutex::new(behavior),
            properties,
            information,
            active,
            inputs: SharedSequence::default(),
            outputs: SharedSequence::default(),
            requirements: Mutex::new(Vec::new()),
            initialized: Flag::new(false),
            associated: Flag::new(false),
            ready,
            crashed,
            running: Flag::new(false),
            shutdown: Flag::new(false),
            stopped: Flag::new(false),
            ready_or_crashed,
            container: RwLock::new(Weak::new()),
            local_path: RwLock::new(PathBuf::new()),
            thread: Mutex::new(None),
            last_error: RwLock::new(None),
            ready_signal: Signal::new(),
            error_signal: Signal::new(),
        }))
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Name of the module type; equals the prototype name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn module_type(&self) -> ModuleType {
        self.module_type
    }

    /// Run the behavior's structural hooks: connectors, properties, requirements
    pub fn initialize(&self) -> Result<(), ModuleError> {
        let mut behavior = self.behavior.lock();
        if self.is_initialized() {
            return Err(ModuleError::AlreadyInitialized {
                module: self.name.clone(),
            });
        }

        let mut setup = ConnectorSetup::new(self.self_ref.clone(), &self.name);
        behavior.connectors(&mut setup)?;
        behavior.properties(&self.properties, &self.information)?;
        let requirements = behavior.requirements();
        drop(behavior);

        let (inputs, outputs) = setup.into_parts();
        self.inputs.set(inputs);
        self.outputs.set(outputs);
        *self.requirements.lock() = requirements;
        self.initialized.set(true);
        debug!("[Module:{}] Initialized", self.name);
        Ok(())
    }

    pub(crate) fn clone_behavior(&self) -> Box<dyn ModuleBehavior> {
        self.behavior.lock().factory()
    }

    pub fn properties(&self) -> &Arc<PropertyGroup> {
        &self.properties
    }

    pub fn information(&self) -> &Arc<PropertyGroup> {
        &self.information
    }

    /// Value of the standard `active` property
    pub fn is_active(&self) -> bool {
        self.active.get_as::<bool>().unwrap_or(true)
    }

    pub fn inputs(&self) -> Vec<Arc<Connector>> {
        self.inputs.snapshot()
    }

    pub fn outputs(&self) -> Vec<Arc<Connector>> {
        self.outputs.snapshot()
    }

    /// Inputs followed by outputs
    pub fn connectors(&self) -> Vec<Arc<Connector>> {
        let mut all = self.inputs();
        all.extend(self.outputs());
        all
    }

    pub fn input(&self, name: &str) -> Result<Arc<Connector>, ModuleError> {
        self.inputs
            .read_ticket()
            .iter()
            .find(|c| c.name() == name)
            .cloned()
            .ok_or_else(|| self.connector_not_found(name))
    }

    pub fn output(&self, name: &str) -> Result<Arc<Connector>, ModuleError> {
        self.outputs
            .read_ticket()
            .iter()
            .find(|c| c.name() == name)
            .cloned()
            .ok_or_else(|| self.connector_not_found(name))
    }

    /// Connector of either direction
    pub fn find_connector(&self, name: &str) -> Result<Arc<Connector>, ModuleError> {
        self.input(name).or_else(|_| self.output(name))
    }

    fn connector_not_found(&self, name: &str) -> ModuleError {
        ModuleError::ConnectorNotFound {
            module: self.name.clone(),
            connector: name.to_string(),
        }
    }

    /// Every (output of `self`, input of `target`) pair that may be connected
    pub fn compatible_pairs(&self, target: &Module) -> Vec<(Arc<Connector>, Arc<Connector>)> {
        let inputs = target.inputs();
        let mut pairs = Vec::new();
        for output in self.outputs.read_ticket().iter() {
            for input in &inputs {
                if output.connectable(input) {
                    pairs.push((Arc::clone(output), Arc::clone(input)));
                }
            }
        }
        pairs
    }

    /// One disconnect combiner per edge touching this module
    pub fn possible_disconnections(&self) -> Vec<DisconnectCombiner> {
        let mut combiners = Vec::new();
        for connector in self.connectors() {
            for peer in connector.connected() {
                combiners.push(DisconnectCombiner::new(Arc::clone(&connector), peer));
            }
        }
        combiners
    }

    /// Remove every edge of every connector. Safe to call repeatedly.
    pub fn disconnect(&self) {
        for connector in self.connectors() {
            connector.disconnect_all();
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn is_associated(&self) -> bool {
        self.associated.get()
    }

    /// Initialized and associated with a container
    pub fn is_usable(&self) -> bool {
        self.is_initialized() && self.is_associated()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.get()
    }

    pub fn is_crashed(&self) -> bool {
        self.crashed.get()
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.get()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_flags(
            self.is_initialized(),
            self.is_associated(),
            self.is_ready(),
            self.is_crashed(),
            self.stopped.get(),
        )
    }

    /// Fault that crashed the module, if any
    pub fn last_error(&self) -> Option<Arc<ModuleError>> {
        self.last_error.read().clone()
    }

    /// Fired when the module becomes ready or crashes
    pub fn ready_or_crashed_condition(&self) -> Arc<Condition> {
        self.ready_or_crashed.condition()
    }

    /// Block until the module is ready or crashed
    pub fn wait_ready_or_crashed(&self) {
        let condition = self.ready_or_crashed.condition();
        loop {
            let seen = condition.generation();
            if self.is_ready() || self.is_crashed() {
                return;
            }
            condition.wait_since(seen);
        }
    }

    pub fn shutdown_condition(&self) -> Arc<Condition> {
        self.shutdown.condition()
    }

    pub fn running_condition(&self) -> Arc<Condition> {
        self.running.condition()
    }

    pub fn ready_signal(&self) -> &Signal<Arc<Module>> {
        &self.ready_signal
    }

    pub fn error_signal(&self) -> &Signal<ModuleErrorEvent> {
        &self.error_signal
    }

    pub fn local_path(&self) -> PathBuf {
        self.local_path.read().clone()
    }

    pub fn set_local_path(&self, path: PathBuf) {
        *self.local_path.write() = path;
    }

    /// Owning container, if it still exists
    pub fn container(&self) -> Option<Arc<ModuleContainer>> {
        self.container.read().upgrade()
    }

    /// Associate with `container`.
    ///
    /// Returns false if the module already belongs to that container.
    pub(crate) fn associate(&self, container: &Arc<ModuleContainer>) -> Result<bool, ModuleError> {
        let mut slot = self.container.write();
        if self.is_associated() {
            return match slot.upgrade() {
                Some(existing) if Arc::ptr_eq(&existing, container) => Ok(false),
                _ => Err(ModuleError::AlreadyAssociated {
                    module: self.name.clone(),
                }),
            };
        }
        *slot = Arc::downgrade(container);
        self.associated.set(true);
        Ok(true)
    }

    pub(crate) fn clear_association(&self) {
        *self.container.write() = Weak::new();
        self.associated.set(false);
    }

    /// Mark ready and notify subscribers
    pub fn set_ready(&self) {
        self.ready.set(true);
        if let Some(me) = self.self_ref.upgrade() {
            self.ready_signal.emit(&me);
        }
    }

    /// Start the module thread. Starting twice is a no-op.
    pub fn run(&self) -> Result<(), ModuleError> {
        if !self.is_initialized() {
            return Err(ModuleError::Uninitialized {
                module: self.name.clone(),
            });
        }
        let module = self.self_ref.upgrade().ok_or_else(|| ModuleError::Uninitialized {
            module: self.name.clone(),
        })?;

        let mut slot = self.thread.lock();
        if slot.is_some() {
            warn!("[Module:{}] Thread already started", self.name);
            return Ok(());
        }

        self.running.set(true);
        let spawned = thread::Builder::new()
            .name(format!("module-{}", self.name))
            .spawn(move || module.thread_main());
        match spawned {
            Ok(handle) => {
                *slot = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.set(false);
                Err(ModuleError::failed(&self.name, format!("can't spawn thread: {}", e)))
            }
        }
    }

    fn thread_main(self: Arc<Self>) {
        debug!("[Module:{}] Thread started", self.name);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute()));
        let fault = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(payload) => Some(ModuleError::Panicked {
                module: self.name.clone(),
                message: panic_message(payload.as_ref()),
            }),
        };

        match fault {
            Some(e) => {
                self.fail(e);
            }
            None => {
                self.stopped.set(true);
                debug!("[Module:{}] Thread finished", self.name);
            }
        }
        self.running.set(false);
    }

    fn execute(self: &Arc<Self>) -> Result<(), ModuleError> {
        for requirement in self.requirements.lock().iter() {
            if !requirement.is_met() {
                return Err(ModuleError::RequirementNotMet {
                    module: self.name.clone(),
                    requirement: requirement.description(),
                });
            }
        }

        let ctx = ModuleContext::new(Arc::clone(self));
        let mut behavior = self.behavior.lock();
        behavior.module_main(&ctx)
    }

    /// Mark crashed, tear down all connections and emit the error.
    ///
    /// Only the first fault counts; later ones are logged and dropped.
    /// Returns whether this call crashed the module.
    pub(crate) fn fail(&self, fault: ModuleError) -> bool {
        let fault = Arc::new(fault);
        {
            let mut last = self.last_error.write();
            if last.is_some() {
                debug!("[Module:{}] Already crashed; ignoring {}", self.name, fault);
                return false;
            }
            *last = Some(Arc::clone(&fault));
        }
        error!("[Module:{}] Crashed: {}", self.name, fault);
        self.crashed.set(true);
        self.disconnect();
        if let Some(me) = self.self_ref.upgrade() {
            self.error_signal.emit(&(me, fault));
        }
        true
    }

    /// Ask the run loop to return
    pub fn request_stop(&self) {
        self.shutdown.set(true);
    }

    /// Optionally request a stop, then join the module thread.
    ///
    /// Returns immediately when called from the module's own thread.
    pub fn wait(&self, request_stop: bool) {
        if request_stop {
            self.request_stop();
        }
        let handle = {
            let mut slot = self.thread.lock();
            match slot.as_ref() {
                Some(h) if h.thread().id() == thread::current().id() => return,
                _ => slot.take(),
            }
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("[Module:{}] Thread ended with an uncaught panic", self.name);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}
