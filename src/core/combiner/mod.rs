//! Declarative graph edits.
//!
//! A combiner describes "add these modules and wire these connectors" and can
//! be applied synchronously or on a background thread registered with a
//! container.

pub mod apply;
pub mod disconnect;
pub mod project_file;
pub mod records;

use crate::core::components::container::ModuleContainer;
use crate::core::error::ModuleError;

// Re-export commonly used types
pub use apply::{ApplyCombiner, ApplyOutcome};
pub use disconnect::DisconnectCombiner;
pub use project_file::{ProjectFileCombiner, ProjectLoadReport};
pub use records::ProjectRecord;

/// A graph edit that can be replayed against a container
pub trait Combiner: Send + 'static {
    type Outcome: Send + 'static;

    /// Apply synchronously. Failures are logged and reported in the outcome.
    fn apply(&self) -> Self::Outcome;

    /// Apply on a pending thread of `container`
    fn run(self, container: &ModuleContainer) -> Result<(), ModuleError>
    where
        Self: Sized,
    {
        container.spawn_pending("combiner", move || {
            self.apply();
        })
    }
}
