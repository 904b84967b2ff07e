use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Kind of a property; `Group` marks nested property groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Group,
    Int,
    Double,
    Bool,
    String,
    Path,
    Selection,
    Position,
    Color,
    Trigger,
}

/// Who is meant to modify a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PropertyPurpose {
    /// Tunable by users and other modules
    #[default]
    Parameter,
    /// Output of the owning module, read-only for everybody else
    Information,
}

/// State of a trigger property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Trigger {
    #[default]
    Ready,
    Triggered,
}

/// Selected indices out of a fixed number of items
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemSelection {
    item_count: usize,
    selected: BTreeSet<usize>,
}

impl ItemSelection {
    /// Selection over `item_count` items with nothing selected
    pub fn new(item_count: usize) -> Self {
        Self {
            item_count,
            selected: BTreeSet::new(),
        }
    }

    /// Selection with the given indices; indices out of range are dropped
    pub fn with_selected(item_count: usize, selected: impl IntoIterator<Item = usize>) -> Self {
        Self {
            item_count,
            selected: selected.into_iter().filter(|i| *i < item_count).collect(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn selected(&self) -> impl Iterator<Item = usize> + '_ {
        self.selected.iter().copied()
    }

    pub fn size(&self) -> usize {
        self.selected.len()
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }
}

/// Value held by a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Int(i32),
    Double(f64),
    Bool(bool),
    String(String),
    Path(PathBuf),
    Selection(ItemSelection),
    Position([f64; 3]),
    Color([f32; 4]),
    Trigger(Trigger),
}

impl PropertyValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Int(_) => PropertyType::Int,
            PropertyValue::Double(_) => PropertyType::Double,
            PropertyValue::Bool(_) => PropertyType::Bool,
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::Path(_) => PropertyType::Path,
            PropertyValue::Selection(_) => PropertyType::Selection,
            PropertyValue::Position(_) => PropertyType::Position,
            PropertyValue::Color(_) => PropertyType::Color,
            PropertyValue::Trigger(_) => PropertyType::Trigger,
        }
    }

    /// Serialize to the textual project-file form
    pub fn to_text(&self) -> String {
        match self {
            PropertyValue::Int(v) => v.to_string(),
            PropertyValue::Double(v) => v.to_string(),
            PropertyValue::Bool(v) => v.to_string(),
            PropertyValue::String(v) => v.clone(),
            PropertyValue::Path(v) => v.to_string_lossy().into_owned(),
            PropertyValue::Selection(v) => join(v.selected()),
            PropertyValue::Position(v) => join(v.iter()),
            PropertyValue::Color(v) => join(v.iter()),
            PropertyValue::Trigger(Trigger::Ready) => "ready".to_string(),
            PropertyValue::Trigger(Trigger::Triggered) => "triggered".to_string(),
        }
    }

    /// Parse `text` into a value of the same kind as `self`.
    ///
    /// `self` supplies context the text does not carry, e.g. the item count of
    /// a selection. Returns `None` for malformed input.
    pub fn parse_like(&self, text: &str) -> Option<PropertyValue> {
        let text_trimmed = text.trim();
        match self {
            PropertyValue::Int(_) => text_trimmed.parse().ok().map(PropertyValue::Int),
            PropertyValue::Double(_) => text_trimmed
                .parse::<f64>()
                .ok()
                .map(PropertyValue::Double),
            PropertyValue::Bool(_) => match text_trimmed {
                "true" | "1" => Some(PropertyValue::Bool(true)),
                "false" | "0" => Some(PropertyValue::Bool(false)),
                _ => None,
            },
            PropertyValue::String(_) => Some(PropertyValue::String(text.to_string())),
            PropertyValue::Path(_) => Some(PropertyValue::Path(PathBuf::from(text))),
            PropertyValue::Selection(current) => {
                let indices = split::<usize>(text_trimmed, None)?;
                if indices.iter().any(|i| *i >= current.item_count) {
                    return None;
                }
                Some(PropertyValue::Selection(ItemSelection::with_selected(
                    current.item_count,
                    indices,
                )))
            }
            PropertyValue::Position(_) => {
                let parts = split::<f64>(text_trimmed, Some(3))?;
                Some(PropertyValue::Position([parts[0], parts[1], parts[2]]))
            }
            PropertyValue::Color(_) => {
                let parts = split::<f32>(text_trimmed, Some(4))?;
                Some(PropertyValue::Color([parts[0], parts[1], parts[2], parts[3]]))
            }
            PropertyValue::Trigger(_) => match text_trimmed {
                "ready" => Some(PropertyValue::Trigger(Trigger::Ready)),
                "triggered" => Some(PropertyValue::Trigger(Trigger::Triggered)),
                _ => None,
            },
        }
    }

    /// Ordering used by min/max constraints; `None` if the kinds are not comparable
    pub fn compare(&self, other: &PropertyValue) -> Option<Ordering> {
        match (self, other) {
            (PropertyValue::Int(a), PropertyValue::Int(b)) => Some(a.cmp(b)),
            (PropertyValue::Double(a), PropertyValue::Double(b)) => a.partial_cmp(b),
            (PropertyValue::String(a), PropertyValue::String(b)) => Some(a.cmp(b)),
            (PropertyValue::Selection(a), PropertyValue::Selection(b)) => Some(a.size().cmp(&b.size())),
            (PropertyValue::Position(a), PropertyValue::Position(b)) => componentwise(a, b),
            (PropertyValue::Color(a), PropertyValue::Color(b)) => componentwise(a, b),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

fn join<T: ToString>(items: impl Iterator<Item = T>) -> String {
    items.map(|v| v.to_string()).collect::<Vec<_>>().join(";")
}

fn split<T: std::str::FromStr>(text: &str, expected: Option<usize>) -> Option<Vec<T>> {
    let values: Vec<T> = if text.is_empty() {
        Vec::new()
    } else {
        text.split(';')
            .map(|part| part.trim().parse::<T>().ok())
            .collect::<Option<Vec<T>>>()?
    };
    match expected {
        Some(n) if values.len() != n => None,
        _ => Some(values),
    }
}

/// `Less`/`Greater` only if every component agrees, `Equal` if all are equal
fn componentwise<T: PartialOrd>(a: &[T], b: &[T]) -> Option<Ordering> {
    let mut result = Ordering::Equal;
    for (x, y) in a.iter().zip(b.iter()) {
        match x.partial_cmp(y)? {
            Ordering::Equal => {}
            ord if result == Ordering::Equal => result = ord,
            ord if ord != result => return None,
            _ => {}
        }
    }
    Some(result)
}

/// Rust types that map onto one [`PropertyValue`] variant
pub trait PropertyKind: Sized {
    const TYPE: PropertyType;

    fn into_value(self) -> PropertyValue;

    fn from_value(value: &PropertyValue) -> Option<Self>;
}

macro_rules! property_kind {
    ($ty:ty, $variant:ident) => {
        impl PropertyKind for $ty {
            const TYPE: PropertyType = PropertyType::$variant;

            fn into_value(self) -> PropertyValue {
                PropertyValue::$variant(self)
            }

            fn from_value(value: &PropertyValue) -> Option<Self> {
                match value {
                    PropertyValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }

        impl From<$ty> for PropertyValue {
            fn from(value: $ty) -> Self {
                PropertyValue::$variant(value)
            }
        }
    };
}

property_kind!(i32, Int);
property_kind!(f64, Double);
property_kind!(bool, Bool);
property_kind!(String, String);
property_kind!(PathBuf, Path);
property_kind!(ItemSelection, Selection);
property_kind!([f64; 3], Position);
property_kind!([f32; 4], Color);
property_kind!(Trigger, Trigger);

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}
