use crate::core::combiner::{ApplyCombiner, ApplyOutcome, Combiner};
use crate::core::components::context::ModuleContext;
use crate::core::components::module::{Module, ModuleErrorEvent};
use crate::core::components::traits::{ModuleBehavior, ModuleType};
use crate::core::connections::ConnectionEvent;
use crate::core::error::{FactoryError, ModuleError};
use crate::core::factory::ModuleFactory;
use crate::core::shared::{SharedMap, SharedSequence};
use crate::core::signal::{Signal, Subscription};
use crate::core::types::ModuleId;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

/// Behavior of the container's own module: become ready, then idle until shutdown
struct ContainerBehavior {
    name: String,
    description: String,
}

impl ModuleBehavior for ContainerBehavior {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn module_type(&self) -> ModuleType {
        ModuleType::Container
    }

    fn factory(&self) -> Box<dyn ModuleBehavior> {
        Box::new(ContainerBehavior {
            name: self.name.clone(),
            description: self.description.clone(),
        })
    }

    fn module_main(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        ctx.ready();
        while !ctx.should_stop() {
            ctx.wait();
        }
        Ok(())
    }
}

/// Notifications forwarded from every module in a container
#[derive(Default)]
pub struct ContainerSignals {
    pub associated: Signal<Arc<Module>>,
    pub ready: Signal<Arc<Module>>,
    pub removed: Signal<Arc<Module>>,
    pub error: Signal<ModuleErrorEvent>,
    pub connection_established: Signal<ConnectionEvent>,
    pub connection_closed: Signal<ConnectionEvent>,
}

/// Registration of a background thread working on a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PendingThread(u64);

struct PendingGuard {
    container: Weak<ModuleContainer>,
    token: PendingThread,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Some(container) = self.container.upgrade() {
            container.finished_pending_thread(self.token);
        }
    }
}

/// A module that owns a set of child modules.
///
/// Children are associated on [`ModuleContainer::add`] and their signals are
/// forwarded to [`ContainerSignals`]. A crashing child crashes the container
/// unless `crash_if_module_crashes` is off, which the root container needs.
pub struct ModuleContainer {
    module: Arc<Module>,
    self_ref: Weak<ModuleContainer>,
    factory: Arc<ModuleFactory>,
    modules: SharedSequence<Arc<Module>>,
    subscriptions: SharedMap<ModuleId, Vec<Subscription>>,
    signals: ContainerSignals,
    crash_if_module_crashes: AtomicBool,
    pending: SharedMap<PendingThread, String>,
    pending_handles: Mutex<Vec<JoinHandle<()>>>,
    next_pending: AtomicU64,
}

impl ModuleContainer {
    /// Create an initialized container; call [`ModuleContainer::start`] to run its thread
    pub fn new(name: &str, description: &str, factory: Arc<ModuleFactory>) -> Result<Arc<ModuleContainer>, ModuleError> {
        let module = Module::new(Box::new(ContainerBehavior {
            name: name.to_string(),
            description: description.to_string(),
        }))?;
        module.initialize()?;

        Ok(Arc::new_cyclic(|self_ref| ModuleContainer {
            module,
            self_ref: self_ref.clone(),
            factory,
            modules: SharedSequence::default(),
            subscriptions: SharedMap::default(),
            signals: ContainerSignals::default(),
            crash_if_module_crashes: AtomicBool::new(true),
            pending: SharedMap::default(),
            pending_handles: Mutex::new(Vec::new()),
            next_pending: AtomicU64::new(0),
        }))
    }

    pub fn name(&self) -> &str {
        self.module.name()
    }

    /// The container's own module
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    pub fn factory(&self) -> &Arc<ModuleFactory> {
        &self.factory
    }

    pub fn signals(&self) -> &ContainerSignals {
        &self.signals
    }

    pub fn crash_if_module_crashes(&self) -> bool {
        self.crash_if_module_crashes.load(Ordering::Acquire)
    }

    pub fn set_crash_if_module_crashes(&self, crash: bool) {
        self.crash_if_module_crashes.store(crash, Ordering::Release);
    }

    /// Start the container's own thread
    pub fn start(&self) -> Result<(), ModuleError> {
        self.module.run()
    }

    /// Associate `module` and optionally start it.
    ///
    /// Adding a module that already belongs to this container is a no-op.
    pub fn add(&self, module: &Arc<Module>, run: bool) -> Result<(), ModuleError> {
        if !module.is_initialized() {
            return Err(ModuleError::Uninitialized {
                module: module.name().to_string(),
            });
        }
        let me = self.self_ref.upgrade().ok_or_else(|| {
            ModuleError::failed(self.name(), "container is being dropped")
        })?;
        if !module.associate(&me)? {
            debug!("[ModuleContainer:{}] \"{}\" is already in this container", self.name(), module.name());
            return Ok(());
        }

        let subscriptions = self.subscribe_default_notifiers(module);
        self.subscriptions.insert(module.id(), subscriptions);
        self.modules.push(Arc::clone(module));
        info!("[ModuleContainer:{}] Added module \"{}\"", self.name(), module.name());
        self.signals.associated.emit(module);

        if run {
            module.run()?;
        }
        Ok(())
    }

    fn subscribe_default_notifiers(&self, module: &Arc<Module>) -> Vec<Subscription> {
        let mut subscriptions = Vec::new();

        let weak = self.self_ref.clone();
        subscriptions.push(module.ready_signal().connect(move |m: &Arc<Module>| {
            if let Some(container) = weak.upgrade() {
                container.signals.ready.emit(m);
            }
        }));

        let weak = self.self_ref.clone();
        subscriptions.push(module.error_signal().connect(move |(m, e): &ModuleErrorEvent| {
            if let Some(container) = weak.upgrade() {
                container.module_error(m, e);
            }
        }));

        for connector in module.connectors() {
            let weak = self.self_ref.clone();
            subscriptions.push(connector.established_signal().connect(move |event: &ConnectionEvent| {
                if let Some(container) = weak.upgrade() {
                    container.signals.connection_established.emit(event);
                }
            }));
            let weak = self.self_ref.clone();
            subscriptions.push(connector.closed_signal().connect(move |event: &ConnectionEvent| {
                if let Some(container) = weak.upgrade() {
                    container.signals.connection_closed.emit(event);
                }
            }));
        }
        subscriptions
    }

    /// Handle a crashed child: forward the error and escalate if configured
    pub fn module_error(&self, module: &Arc<Module>, fault: &Arc<ModuleError>) {
        error!("[ModuleContainer:{}] Module \"{}\" crashed: {}", self.name(), module.name(), fault);
        self.signals.error.emit(&(Arc::clone(module), Arc::clone(fault)));

        if self.crash_if_module_crashes() && !self.module.is_crashed() {
            info!("[ModuleContainer:{}] Crashing container because a child crashed", self.name());
            self.module.request_stop();
            self.module.fail(ModuleError::failed(
                self.name(),
                format!("child module \"{}\" crashed: {}", module.name(), fault),
            ));
        }
    }

    /// Remove `module` and disconnect it.
    ///
    /// Removal is flat: modules depending on it stay. The module thread is not
    /// stopped; use [`Module::wait`] for that.
    pub fn remove(&self, module: &Arc<Module>) -> bool {
        if self.modules.remove_first(|m| Arc::ptr_eq(m, module)).is_none() {
            return false;
        }
        if let Some(subscriptions) = self.subscriptions.erase(&module.id()) {
            subscriptions.iter().for_each(Subscription::cancel);
        }
        module.disconnect();
        module.clear_association();
        info!("[ModuleContainer:{}] Removed module \"{}\"", self.name(), module.name());
        self.signals.removed.emit(module);
        true
    }

    /// Stop pending threads, then every module, then the container itself
    pub fn stop(&self) {
        info!("[ModuleContainer:{}] Waiting for pending threads", self.name());
        self.wait_pending_threads();

        let modules = self.modules.snapshot();
        info!("[ModuleContainer:{}] Stopping {} modules", self.name(), modules.len());
        for module in &modules {
            module.request_stop();
        }
        for module in &modules {
            debug!("[ModuleContainer:{}] Waiting for \"{}\"", self.name(), module.name());
            module.wait(false);
        }

        for subscriptions in self.subscriptions.read_ticket().values() {
            subscriptions.iter().for_each(Subscription::cancel);
        }
        self.subscriptions.clear();
        for module in &modules {
            module.clear_association();
        }
        self.modules.write_ticket().clear();

        self.module.wait(true);
    }

    /// Register a background thread; `stop` waits for it to be finished
    pub fn add_pending_thread(&self, name: &str) -> PendingThread {
        let token = PendingThread(self.next_pending.fetch_add(1, Ordering::Relaxed));
        self.pending.insert(token, name.to_string());
        token
    }

    pub fn finished_pending_thread(&self, token: PendingThread) {
        if self.pending.erase(&token).is_none() {
            warn!("[ModuleContainer:{}] Unknown pending thread {:?}", self.name(), token);
        }
    }

    pub fn pending_thread_count(&self) -> usize {
        self.pending.size()
    }

    /// Run `job` on a registered background thread
    pub fn spawn_pending<F>(&self, name: &str, job: F) -> Result<(), ModuleError>
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.add_pending_thread(name);
        let guard = PendingGuard {
            container: self.self_ref.clone(),
            token,
        };
        let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
            let _guard = guard;
            job();
        });

        match spawned {
            Ok(handle) => {
                let mut handles = self.pending_handles.lock();
                handles.retain(|h| !h.is_finished());
                handles.push(handle);
                Ok(())
            }
            Err(e) => Err(ModuleError::failed(self.name(), format!("can't spawn \"{}\": {}", name, e))),
        }
    }

    fn wait_pending_threads(&self) {
        let condition = self.pending.change_condition();
        loop {
            let seen = condition.generation();
            if self.pending.size() == 0 {
                break;
            }
            condition.wait_since(seen);
        }

        let handles: Vec<JoinHandle<()>> = self.pending_handles.lock().drain(..).collect();
        for handle in handles {
            if handle.thread().id() == thread::current().id() {
                continue;
            }
            if handle.join().is_err() {
                error!("[ModuleContainer:{}] A pending thread panicked", self.name());
            }
        }
    }

    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.modules.snapshot()
    }

    pub fn modules_named(&self, name: &str) -> Vec<Arc<Module>> {
        self.modules
            .read_ticket()
            .iter()
            .filter(|m| m.name() == name)
            .cloned()
            .collect()
    }

    pub fn find(&self, id: ModuleId) -> Option<Arc<Module>> {
        self.modules.read_ticket().iter().find(|m| m.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Create `prototype_name`, add it, and connect the first output of `on`
    /// to the new module's first input
    pub fn apply_module(&self, on: &Arc<Module>, prototype_name: &str) -> Result<Arc<Module>, FactoryError> {
        let me = self
            .self_ref
            .upgrade()
            .ok_or_else(|| ModuleError::failed(self.name(), "container is being dropped"))?;
        let prototype = self.factory.prototype_by_name(prototype_name)?;
        let source_connector = on.outputs().first().map(|c| c.name().to_string()).unwrap_or_default();
        let target_connector = prototype.inputs().first().map(|c| c.name().to_string()).unwrap_or_default();

        let combiner = ApplyCombiner::new(me, Some(Arc::clone(on)), &source_connector, prototype, &target_connector);
        let ApplyOutcome { target, error, .. } = combiner.apply();
        match (target, error) {
            (_, Some(e)) => Err(e),
            (Some(target), None) => Ok(target),
            (None, None) => Err(ModuleError::failed(prototype_name, "no module was created").into()),
        }
    }

    /// Apply combiners for every compatible edge between `module` and the
    /// other modules of this container, in both directions
    pub fn possible_connections(&self, module: &Arc<Module>) -> Vec<ApplyCombiner> {
        let me = match self.self_ref.upgrade() {
            Some(me) => me,
            None => return Vec::new(),
        };

        let mut combiners = Vec::new();
        for other in self.modules() {
            if Arc::ptr_eq(&other, module) {
                continue;
            }
            for (output, input) in module.compatible_pairs(&other) {
                combiners.push(ApplyCombiner::new(
                    Arc::clone(&me),
                    Some(Arc::clone(module)),
                    output.name(),
                    Arc::clone(&other),
                    input.name(),
                ));
            }
            for (output, input) in other.compatible_pairs(module) {
                combiners.push(ApplyCombiner::new(
                    Arc::clone(&me),
                    Some(Arc::clone(&other)),
                    output.name(),
                    Arc::clone(module),
                    input.name(),
                ));
            }
        }
        combiners
    }
}

impl std::fmt::Debug for ModuleContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContainer")
            .field("name", &self.name())
            .field("modules", &self.len())
            .finish()
    }
}
