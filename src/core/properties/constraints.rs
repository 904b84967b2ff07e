use super::value::PropertyValue;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Discriminant of a [`Constraint`], used to replace or remove all constraints of one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintKind {
    Min,
    Max,
    NotEmpty,
    PathExists,
    IsDirectory,
    SelectOnlyOne,
    Custom,
}

/// Predicate attached to a property; a value is accepted only if all constraints hold
#[derive(Clone)]
pub enum Constraint {
    /// Value must not compare less than the bound
    Min(PropertyValue),
    /// Value must not compare greater than the bound
    Max(PropertyValue),
    /// Strings and paths must not be empty, selections must select something
    NotEmpty,
    /// Path must exist on disk
    PathExists,
    /// Path must be an existing directory
    IsDirectory,
    /// Selection must select exactly one item
    SelectOnlyOne,
    /// Arbitrary predicate
    Custom {
        name: String,
        predicate: Arc<dyn Fn(&PropertyValue) -> bool + Send + Sync>,
    },
}

impl Constraint {
    /// Build a named custom constraint
    pub fn custom<F>(name: &str, predicate: F) -> Self
    where
        F: Fn(&PropertyValue) -> bool + Send + Sync + 'static,
    {
        Constraint::Custom {
            name: name.to_string(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn kind(&self) -> ConstraintKind {
        match self {
            Constraint::Min(_) => ConstraintKind::Min,
            Constraint::Max(_) => ConstraintKind::Max,
            Constraint::NotEmpty => ConstraintKind::NotEmpty,
            Constraint::PathExists => ConstraintKind::PathExists,
            Constraint::IsDirectory => ConstraintKind::IsDirectory,
            Constraint::SelectOnlyOne => ConstraintKind::SelectOnlyOne,
            Constraint::Custom { .. } => ConstraintKind::Custom,
        }
    }

    /// Whether `value` satisfies this constraint.
    ///
    /// Bounds whose kind does not match the value reject it.
    pub fn accept(&self, value: &PropertyValue) -> bool {
        match self {
            Constraint::Min(min) => matches!(
                value.compare(min),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            ),
            Constraint::Max(max) => matches!(
                value.compare(max),
                Some(Ordering::Less) | Some(Ordering::Equal)
            ),
            Constraint::NotEmpty => match value {
                PropertyValue::String(s) => !s.is_empty(),
                PropertyValue::Path(p) => !p.as_os_str().is_empty(),
                PropertyValue::Selection(s) => s.size() != 0,
                _ => true,
            },
            Constraint::PathExists => match value {
                PropertyValue::Path(p) => p.exists(),
                _ => false,
            },
            Constraint::IsDirectory => match value {
                PropertyValue::Path(p) => p.is_dir(),
                _ => false,
            },
            Constraint::SelectOnlyOne => match value {
                PropertyValue::Selection(s) => s.size() == 1,
                _ => false,
            },
            Constraint::Custom { predicate, .. } => predicate(value),
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Min(v) => f.debug_tuple("Min").field(v).finish(),
            Constraint::Max(v) => f.debug_tuple("Max").field(v).finish(),
            Constraint::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
            other => write!(f, "{:?}", other.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::properties::value::ItemSelection;
    use std::path::PathBuf;

    #[test]
    fn test_min_max_bounds_are_inclusive() {
        let min = Constraint::Min(PropertyValue::Int(5));
        assert!(min.accept(&PropertyValue::Int(5)));
        assert!(!min.accept(&PropertyValue::Int(3)));

        let max = Constraint::Max(PropertyValue::Double(1.0));
        assert!(max.accept(&PropertyValue::Double(1.0)));
        assert!(!max.accept(&PropertyValue::Double(1.5)));
        // mismatched kinds never satisfy a bound
        assert!(!max.accept(&PropertyValue::Int(0)));
    }

    #[test]
    fn test_not_empty_and_selection() {
        assert!(!Constraint::NotEmpty.accept(&PropertyValue::String(String::new())));
        assert!(Constraint::NotEmpty.accept(&PropertyValue::String("x".into())));

        let one = PropertyValue::Selection(ItemSelection::with_selected(3, [1]));
        let two = PropertyValue::Selection(ItemSelection::with_selected(3, [0, 1]));
        assert!(Constraint::SelectOnlyOne.accept(&one));
        assert!(!Constraint::SelectOnlyOne.accept(&two));
    }

    #[test]
    fn test_path_constraints() {
        let dir = std::env::temp_dir();
        assert!(Constraint::PathExists.accept(&PropertyValue::Path(dir.clone())));
        assert!(Constraint::IsDirectory.accept(&PropertyValue::Path(dir)));
        let missing = PathBuf::from("/definitely/not/here/at/all");
        assert!(!Constraint::PathExists.accept(&PropertyValue::Path(missing)));
    }

    #[test]
    fn test_custom_constraint() {
        let even = Constraint::custom("even", |v| matches!(v, PropertyValue::Int(i) if i % 2 == 0));
        assert_eq!(even.kind(), ConstraintKind::Custom);
        assert!(even.accept(&PropertyValue::Int(4)));
        assert!(!even.accept(&PropertyValue::Int(3)));
    }
}
