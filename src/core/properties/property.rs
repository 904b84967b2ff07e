use super::constraints::{Constraint, ConstraintKind};
use super::value::{PropertyKind, PropertyPurpose, PropertyType, PropertyValue};
use crate::core::conditions::Condition;
use crate::core::error::PropertyError;
use crate::core::shared::{SharedMap, SharedValue};
use crate::core::signal::Subscription;
use log::debug;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Identifier of a constraint within one property
pub type ConstraintId = u64;

/// Separator of nested group paths
pub const PATH_SEPARATOR: char = '/';

/// Check that `name` can be used for a property or group
pub fn validate_name(name: &str) -> Result<(), PropertyError> {
    if name.is_empty() || name.contains(PATH_SEPARATOR) {
        return Err(PropertyError::NameMalformed {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Named, typed, constrained value with change notification
pub struct Property {
    name: String,
    description: String,
    property_type: PropertyType,
    value: SharedValue<PropertyValue>,
    hidden: AtomicBool,
    purpose: RwLock<PropertyPurpose>,
    constraints: SharedMap<ConstraintId, Constraint>,
    next_constraint: AtomicU64,
    user_set: AtomicBool,
    set_gate: Mutex<()>,
}

impl Property {
    /// Create a property; the kind is fixed by `initial`
    pub fn new(
        name: &str,
        description: &str,
        initial: impl Into<PropertyValue>,
    ) -> Result<Arc<Property>, PropertyError> {
        validate_name(name)?;
        let initial = initial.into();
        Ok(Arc::new(Self::build(name, description, initial)))
    }

    fn build(name: &str, description: &str, initial: PropertyValue) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            property_type: initial.property_type(),
            value: SharedValue::new(initial),
            hidden: AtomicBool::new(false),
            purpose: RwLock::new(PropertyPurpose::Parameter),
            constraints: SharedMap::default(),
            next_constraint: AtomicU64::new(0),
            user_set: AtomicBool::new(false),
            set_gate: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    pub fn purpose(&self) -> PropertyPurpose {
        *self.purpose.read()
    }

    pub fn set_purpose(&self, purpose: PropertyPurpose) {
        *self.purpose.write() = purpose;
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::Acquire)
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.store(hidden, Ordering::Release);
    }

    /// Whether `set` succeeded at least once
    pub fn is_user_set(&self) -> bool {
        self.user_set.load(Ordering::Acquire)
    }

    pub fn get(&self) -> PropertyValue {
        self.value.get()
    }

    /// Typed read; `None` if `T` is not this property's kind
    pub fn get_as<T: PropertyKind>(&self) -> Option<T> {
        T::from_value(&self.value.read_ticket())
    }

    /// Whether `value` has the right kind and satisfies every constraint
    pub fn accept(&self, value: &PropertyValue) -> bool {
        if value.property_type() != self.property_type {
            return false;
        }
        self.constraints
            .read_ticket()
            .values()
            .all(|constraint| constraint.accept(value))
    }

    /// Set a new value and notify subscribers.
    ///
    /// Returns false and keeps the old value if the new one is not accepted.
    pub fn set(&self, value: impl Into<PropertyValue>) -> bool {
        self.set_with(value, false)
    }

    /// Like [`Property::set`], optionally without firing the update condition
    pub fn set_with(&self, value: impl Into<PropertyValue>, suppress_notification: bool) -> bool {
        let gate = self.set_gate.lock();
        self.store(gate, value.into(), suppress_notification, true)
    }

    /// Set a default that never overrides a value set explicitly via `set`
    pub fn set_recommended_value(&self, value: impl Into<PropertyValue>) -> bool {
        let gate = self.set_gate.lock();
        if self.is_user_set() {
            debug!("[Property:{}] Ignoring recommended value; value was set explicitly", self.name);
            return false;
        }
        self.store(gate, value.into(), false, false)
    }

    /// Replace the value with `candidate` if the current value violates the active constraints.
    ///
    /// Returns whether the property holds a valid value afterwards.
    pub fn ensure_validity(&self, candidate: impl Into<PropertyValue>, suppress_notification: bool) -> bool {
        let gate = self.set_gate.lock();
        let current = self.value.get();
        if self.accept(&current) {
            return true;
        }
        self.store(gate, candidate.into(), suppress_notification, false)
    }

    fn store(
        &self,
        gate: MutexGuard<'_, ()>,
        value: PropertyValue,
        suppress_notification: bool,
        mark_user_set: bool,
    ) -> bool {
        if !self.accept(&value) {
            return false;
        }

        let mut ticket = self.value.write_ticket();
        *ticket = value;
        if suppress_notification {
            ticket.suppress_unlock_condition();
        }
        if mark_user_set {
            self.user_set.store(true, Ordering::Release);
        }

        // subscribers run after both locks are gone so they may call back into us
        drop(gate);
        drop(ticket);
        true
    }

    /// Parse and set; returns false for malformed or rejected input
    pub fn set_as_string(&self, text: &str) -> bool {
        let parsed = self.value.read_ticket().parse_like(text);
        match parsed {
            Some(value) => self.set(value),
            None => {
                debug!("[Property:{}] Could not parse \"{}\" as {:?}", self.name, text, self.property_type);
                false
            }
        }
    }

    pub fn get_as_string(&self) -> String {
        self.value.read_ticket().to_text()
    }

    /// Condition fired on every accepted change
    pub fn update_condition(&self) -> Arc<Condition> {
        self.value.change_condition()
    }

    /// Subscribe a change callback
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.value.change_condition().subscribe_signal(callback)
    }

    pub fn add_constraint(&self, constraint: Constraint) -> ConstraintId {
        let id = self.next_constraint.fetch_add(1, Ordering::Relaxed);
        self.constraints.insert(id, constraint);
        id
    }

    /// Swap every constraint of the same kind for `constraint` in a single write
    pub fn replace_constraint(&self, constraint: Constraint) -> ConstraintId {
        let id = self.next_constraint.fetch_add(1, Ordering::Relaxed);
        let kind = constraint.kind();
        let mut ticket = self.constraints.write_ticket();
        ticket.retain(|_, c| c.kind() != kind);
        ticket.insert(id, constraint);
        id
    }

    pub fn remove_constraint(&self, id: ConstraintId) -> bool {
        self.constraints.erase(&id).is_some()
    }

    /// Remove all constraints of `kind`
    pub fn remove_constraints(&self, kind: ConstraintKind) -> usize {
        let mut ticket = self.constraints.write_ticket();
        let before = ticket.len();
        ticket.retain(|_, c| c.kind() != kind);
        let removed = before - ticket.len();
        if removed == 0 {
            ticket.suppress_unlock_condition();
        }
        removed
    }

    pub fn count_constraints(&self, kind: ConstraintKind) -> usize {
        self.constraints
            .read_ticket()
            .values()
            .filter(|c| c.kind() == kind)
            .count()
    }

    pub fn constraints(&self) -> Vec<Constraint> {
        self.constraints.values_snapshot()
    }

    /// Replace the lower bound
    pub fn set_min(&self, min: impl Into<PropertyValue>) -> ConstraintId {
        self.replace_constraint(Constraint::Min(min.into()))
    }

    /// Replace the upper bound
    pub fn set_max(&self, max: impl Into<PropertyValue>) -> ConstraintId {
        self.replace_constraint(Constraint::Max(max.into()))
    }

    pub fn min(&self) -> Option<PropertyValue> {
        self.constraints.read_ticket().values().find_map(|c| match c {
            Constraint::Min(v) => Some(v.clone()),
            _ => None,
        })
    }

    pub fn max(&self) -> Option<PropertyValue> {
        self.constraints.read_ticket().values().find_map(|c| match c {
            Constraint::Max(v) => Some(v.clone()),
            _ => None,
        })
    }

    /// Deep copy: fresh value cell and condition, same value, flags and constraints,
    /// no subscriptions
    pub fn clone_property(&self) -> Arc<Property> {
        let copy = Self::build(&self.name, &self.description, self.get());
        copy.set_hidden(self.is_hidden());
        copy.set_purpose(self.purpose());
        copy.user_set.store(self.is_user_set(), Ordering::Release);
        {
            let source = self.constraints.read_ticket();
            let mut target = copy.constraints.write_ticket();
            target.extend(source.iter().map(|(id, c)| (*id, c.clone())));
            target.suppress_unlock_condition();
        }
        copy.next_constraint
            .store(self.next_constraint.load(Ordering::Relaxed), Ordering::Relaxed);
        Arc::new(copy)
    }
}

impl std::fmt::Debug for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value", &self.get())
            .field("purpose", &self.purpose())
            .finish()
    }
}
