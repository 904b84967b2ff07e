use super::Combiner;
use crate::core::connections::Connector;
use log::{debug, warn};
use std::sync::Arc;

/// Removes one edge between two connectors
pub struct DisconnectCombiner {
    source: Arc<Connector>,
    target: Arc<Connector>,
}

impl DisconnectCombiner {
    pub fn new(source: Arc<Connector>, target: Arc<Connector>) -> Self {
        Self { source, target }
    }

    pub fn source(&self) -> &Arc<Connector> {
        &self.source
    }

    pub fn target(&self) -> &Arc<Connector> {
        &self.target
    }
}

impl Combiner for DisconnectCombiner {
    /// Whether an edge was removed
    type Outcome = bool;

    fn apply(&self) -> bool {
        let removed = self.source.disconnect(&self.target);
        if removed {
            debug!(
                "[DisconnectCombiner] Disconnected {} from {}",
                self.source.canonical_name(),
                self.target.canonical_name()
            );
        } else {
            warn!(
                "[DisconnectCombiner] {} and {} were not connected",
                self.source.canonical_name(),
                self.target.canonical_name()
            );
        }
        removed
    }
}

impl std::fmt::Debug for DisconnectCombiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisconnectCombiner")
            .field("source", &self.source.canonical_name())
            .field("target", &self.target.canonical_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::components::module::Module;
    use crate::core::components::testing::{Sink, Source};

    #[test]
    fn test_possible_disconnections_remove_edges() {
        let a = Module::new(Box::new(Source::new("A"))).unwrap();
        a.initialize().unwrap();
        let b = Module::new(Box::new(Sink::new("B"))).unwrap();
        b.initialize().unwrap();
        a.output("out").unwrap().connect(&b.input("in").unwrap(), false).unwrap();

        let combiners = b.possible_disconnections();
        assert_eq!(combiners.len(), 1);
        assert_eq!(combiners[0].source().canonical_name(), "B:in");
        assert!(combiners[0].apply());
        assert!(!combiners[0].apply());
        assert!(a.possible_disconnections().is_empty());
    }
}
