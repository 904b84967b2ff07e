use std::any::{Any, TypeId};
use std::fmt;

/// Which way data flows through a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Input => Direction::Output,
            Direction::Output => Direction::Input,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

struct AnyData;

/// Payload type carried by a connector
#[derive(Clone, Copy)]
pub struct DataType {
    id: TypeId,
    name: &'static str,
}

impl DataType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Wildcard accepted by inputs that take any payload
    pub fn any() -> Self {
        Self {
            id: TypeId::of::<AnyData>(),
            name: "any",
        }
    }

    pub fn is_any(&self) -> bool {
        self.id == TypeId::of::<AnyData>()
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether an input of this type can consume data of type `offered`
    pub fn accepts(&self, offered: &DataType) -> bool {
        self.is_any() || self.id == offered.id
    }
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DataType {}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataType({})", self.name)
    }
}
