pub mod constraints;
pub mod group;
pub mod property;
pub mod value;

// Re-export commonly used types
pub use constraints::{Constraint, ConstraintKind};
pub use group::{PropertyEntry, PropertyGroup};
pub use property::{ConstraintId, Property, PATH_SEPARATOR};
pub use value::{ItemSelection, PropertyKind, PropertyPurpose, PropertyType, PropertyValue, Trigger};
