use super::Combiner;
use crate::core::components::container::ModuleContainer;
use crate::core::components::module::Module;
use crate::core::error::{FactoryError, ModuleError};
use log::{debug, error, warn};
use std::sync::Arc;

/// Result of applying an [`ApplyCombiner`]
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub source: Option<Arc<Module>>,
    pub target: Option<Arc<Module>>,
    pub connected: bool,
    pub error: Option<FactoryError>,
}

impl ApplyOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Adds modules to a container and connects one pair of connectors.
///
/// Source and target may be prototypes; they are instantiated through the
/// container's factory. An empty connector name means "add only".
pub struct ApplyCombiner {
    container: Arc<ModuleContainer>,
    source: Option<Arc<Module>>,
    source_connector: String,
    target: Arc<Module>,
    target_connector: String,
}

impl ApplyCombiner {
    pub fn new(
        container: Arc<ModuleContainer>,
        source: Option<Arc<Module>>,
        source_connector: &str,
        target: Arc<Module>,
        target_connector: &str,
    ) -> Self {
        Self {
            container,
            source,
            source_connector: source_connector.to_string(),
            target,
            target_connector: target_connector.to_string(),
        }
    }

    /// Only add `target`, without wiring
    pub fn add_only(container: Arc<ModuleContainer>, target: Arc<Module>) -> Self {
        Self::new(container, None, "", target, "")
    }

    pub fn container(&self) -> &Arc<ModuleContainer> {
        &self.container
    }

    pub fn source(&self) -> Option<&Arc<Module>> {
        self.source.as_ref()
    }

    pub fn source_connector(&self) -> &str {
        &self.source_connector
    }

    pub fn target(&self) -> &Arc<Module> {
        &self.target
    }

    pub fn target_connector(&self) -> &str {
        &self.target_connector
    }

    fn instantiate(&self, module: &Arc<Module>) -> Result<Arc<Module>, FactoryError> {
        let factory = self.container.factory();
        if factory.is_prototype(module) {
            factory.create(module)
        } else {
            Ok(Arc::clone(module))
        }
    }

    fn try_apply(&self, outcome: &mut ApplyOutcome) -> Result<(), FactoryError> {
        let source = match &self.source {
            Some(source) => Some(self.instantiate(source)?),
            None => None,
        };
        let target = self.instantiate(&self.target)?;
        outcome.source = source.clone();
        outcome.target = Some(Arc::clone(&target));

        if let Some(source) = &source {
            self.container.add(source, true)?;
        }
        self.container.add(&target, true)?;

        for module in source.iter().chain(std::iter::once(&target)) {
            // modules added without a thread never become ready
            if module.is_running() {
                module.wait_ready_or_crashed();
            }
            if module.is_crashed() {
                return Err(ModuleError::failed(module.name(), "crashed before it became ready").into());
            }
        }

        let source = match source {
            Some(source) => source,
            None => return Ok(()),
        };
        if self.source_connector.is_empty() || self.target_connector.is_empty() {
            return Ok(());
        }

        let from = source.find_connector(&self.source_connector)?;
        let to = target.find_connector(&self.target_connector)?;
        from.connect(&to, false).map_err(ModuleError::from)?;
        outcome.connected = true;
        debug!(
            "[ApplyCombiner] Connected {} to {}",
            from.canonical_name(),
            to.canonical_name()
        );
        Ok(())
    }
}

impl Combiner for ApplyCombiner {
    type Outcome = ApplyOutcome;

    fn apply(&self) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        if let Err(e) = self.try_apply(&mut outcome) {
            match &e {
                FactoryError::Module(ModuleError::Failed { .. }) => warn!("[ApplyCombiner] Aborted: {}", e),
                _ => error!("[ApplyCombiner] Failed: {}", e),
            }
            outcome.error = Some(e);
        }
        outcome
    }
}

impl std::fmt::Debug for ApplyCombiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyCombiner")
            .field("source", &self.source.as_ref().map(|m| m.name().to_string()))
            .field("source_connector", &self.source_connector)
            .field("target", &self.target.name())
            .field("target_connector", &self.target_connector)
            .finish()
    }
}
