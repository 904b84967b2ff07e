use super::property::{validate_name, Property, PATH_SEPARATOR};
use super::value::{PropertyPurpose, PropertyValue};
use crate::core::conditions::{Condition, ConditionSet};
use crate::core::error::PropertyError;
use crate::core::shared::SharedSequence;
use crate::core::signal::Subscription;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Child of a property group
#[derive(Clone, Debug)]
pub enum PropertyEntry {
    Property(Arc<Property>),
    Group(Arc<PropertyGroup>),
}

impl PropertyEntry {
    pub fn name(&self) -> &str {
        match self {
            PropertyEntry::Property(p) => p.name(),
            PropertyEntry::Group(g) => g.name(),
        }
    }

    pub fn update_condition(&self) -> Arc<Condition> {
        match self {
            PropertyEntry::Property(p) => p.update_condition(),
            PropertyEntry::Group(g) => g.update_condition(),
        }
    }

    pub fn purpose(&self) -> PropertyPurpose {
        match self {
            PropertyEntry::Property(p) => p.purpose(),
            PropertyEntry::Group(g) => g.purpose(),
        }
    }

    fn set_purpose(&self, purpose: PropertyPurpose) {
        match self {
            PropertyEntry::Property(p) => p.set_purpose(purpose),
            PropertyEntry::Group(g) => g.set_purpose(purpose),
        }
    }

    pub fn as_property(&self) -> Option<&Arc<Property>> {
        match self {
            PropertyEntry::Property(p) => Some(p),
            PropertyEntry::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Arc<PropertyGroup>> {
        match self {
            PropertyEntry::Group(g) => Some(g),
            PropertyEntry::Property(_) => None,
        }
    }

    fn clone_entry(&self) -> PropertyEntry {
        match self {
            PropertyEntry::Property(p) => PropertyEntry::Property(p.clone_property()),
            PropertyEntry::Group(g) => PropertyEntry::Group(g.clone_group()),
        }
    }
}

/// Ordered, name-unique collection of properties and nested groups.
///
/// Every child's update condition is part of the group's own condition set, so
/// waiting on [`PropertyGroup::update_condition`] wakes on any change below it,
/// including structural changes to the list itself.
pub struct PropertyGroup {
    name: String,
    description: String,
    entries: SharedSequence<PropertyEntry>,
    update: ConditionSet,
    purpose: RwLock<PropertyPurpose>,
    hidden: AtomicBool,
}

impl PropertyGroup {
    pub fn new(name: &str, description: &str) -> Result<Arc<PropertyGroup>, PropertyError> {
        validate_name(name)?;
        let group = PropertyGroup {
            name: name.to_string(),
            description: description.to_string(),
            entries: SharedSequence::default(),
            update: ConditionSet::new(),
            purpose: RwLock::new(PropertyPurpose::Parameter),
            hidden: AtomicBool::new(false),
        };
        group.update.add(group.entries.change_condition());
        Ok(Arc::new(group))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
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

    /// Create and add a property
    pub fn add_property(
        &self,
        name: &str,
        description: &str,
        initial: impl Into<PropertyValue>,
    ) -> Result<Arc<Property>, PropertyError> {
        let property = Property::new(name, description, initial)?;
        self.add(PropertyEntry::Property(Arc::clone(&property)))?;
        Ok(property)
    }

    /// Create and add a nested group
    pub fn add_group(&self, name: &str, description: &str) -> Result<Arc<PropertyGroup>, PropertyError> {
        let group = PropertyGroup::new(name, description)?;
        self.add(PropertyEntry::Group(Arc::clone(&group)))?;
        Ok(group)
    }

    /// Add an existing property or group.
    ///
    /// Children of an information group become information children.
    pub fn add(&self, entry: PropertyEntry) -> Result<(), PropertyError> {
        let mut entries = self.entries.write_ticket();
        if entries.iter().any(|e| e.name() == entry.name()) {
            entries.suppress_unlock_condition();
            return Err(PropertyError::NameNotUnique {
                name: entry.name().to_string(),
                group: self.name.clone(),
            });
        }

        if self.purpose() == PropertyPurpose::Information {
            entry.set_purpose(PropertyPurpose::Information);
        }
        self.update.add(entry.update_condition());
        entries.push(entry);
        Ok(())
    }

    /// Remove a direct child by name
    pub fn remove(&self, name: &str) -> bool {
        match self.entries.remove_first(|e| e.name() == name) {
            Some(entry) => {
                self.update.remove(&entry.update_condition());
                true
            }
            None => false,
        }
    }

    /// Exact, non-recursive lookup
    pub fn find_property(&self, name: &str) -> Option<PropertyEntry> {
        self.entries
            .read_ticket()
            .iter()
            .find(|e| e.name() == name)
            .cloned()
    }

    /// Lookup of a `/`-separated path through nested groups
    pub fn find(&self, path: &str) -> Option<PropertyEntry> {
        let (head, rest) = match path.split_once(PATH_SEPARATOR) {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let entry = self.find_property(head)?;
        match rest {
            None => Some(entry),
            Some(rest) => entry.as_group()?.find(rest),
        }
    }

    /// Whether `path` resolves to anything
    pub fn exists(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Resolve `path` to a value property
    pub fn get_property(&self, path: &str) -> Result<Arc<Property>, PropertyError> {
        match self.find(path) {
            Some(PropertyEntry::Property(p)) => Ok(p),
            Some(PropertyEntry::Group(_)) => Err(PropertyError::NotAProperty {
                path: path.to_string(),
            }),
            None => Err(PropertyError::Unknown {
                path: path.to_string(),
            }),
        }
    }

    /// Resolve `path` to a nested group
    pub fn get_group(&self, path: &str) -> Result<Arc<PropertyGroup>, PropertyError> {
        match self.find(path) {
            Some(PropertyEntry::Group(g)) => Ok(g),
            _ => Err(PropertyError::Unknown {
                path: path.to_string(),
            }),
        }
    }

    pub fn entries(&self) -> Vec<PropertyEntry> {
        self.entries.snapshot()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every value property below this group with its path relative to it, depth first
    pub fn flatten(&self) -> Vec<(String, Arc<Property>)> {
        let mut out = Vec::new();
        self.collect_into("", &mut out);
        out
    }

    fn collect_into(&self, prefix: &str, out: &mut Vec<(String, Arc<Property>)>) {
        for entry in self.entries.read_ticket().iter() {
            let path = if prefix.is_empty() {
                entry.name().to_string()
            } else {
                format!("{}{}{}", prefix, PATH_SEPARATOR, entry.name())
            };
            match entry {
                PropertyEntry::Property(p) => out.push((path, Arc::clone(p))),
                PropertyEntry::Group(g) => g.collect_into(&path, out),
            }
        }
    }

    /// Condition fired whenever a child changes or the child list changes
    pub fn update_condition(&self) -> Arc<Condition> {
        self.update.condition()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.update.condition().subscribe_signal(callback)
    }

    /// Deep copy with fresh conditions; subscriptions are not carried over
    pub fn clone_group(&self) -> Arc<PropertyGroup> {
        let copy = PropertyGroup {
            name: self.name.clone(),
            description: self.description.clone(),
            entries: SharedSequence::default(),
            update: ConditionSet::new(),
            purpose: RwLock::new(self.purpose()),
            hidden: AtomicBool::new(self.is_hidden()),
        };
        copy.update.add(copy.entries.change_condition());
        {
            let source = self.entries.read_ticket();
            let mut target = copy.entries.write_ticket();
            for entry in source.iter() {
                let cloned = entry.clone_entry();
                copy.update.add(cloned.update_condition());
                target.push(cloned);
            }
            target.suppress_unlock_condition();
        }
        Arc::new(copy)
    }
}

impl std::fmt::Debug for PropertyGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyGroup")
            .field("name", &self.name)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn sample() -> Arc<PropertyGroup> {
        let root = PropertyGroup::new("Properties", "").unwrap();
        root.add_property("threshold", "", 0.0).unwrap();
        let view = root.add_group("view", "").unwrap();
        view.add_property("opacity", "", 1.0).unwrap();
        let deep = view.add_group("deep", "").unwrap();
        deep.add_property("depth", "", 3).unwrap();
        root
    }

    #[test]
    fn test_names_are_unique_per_group() {
        let group = sample();
        let err = group.add_property("threshold", "", 1).unwrap_err();
        assert_eq!(err.as_label(), "property_name_not_unique");
        assert!(group.add_property("bad/name", "", 1).is_err());
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn test_exact_and_path_lookup() {
        let group = sample();
        assert!(group.find_property("threshold").is_some());
        // exact lookup does not descend
        assert!(group.find_property("view/opacity").is_none());
        assert!(group.find("view/opacity").is_some());
        assert_eq!(
            group.get_property("view/deep/depth").unwrap().get_as::<i32>(),
            Some(3)
        );
        assert_eq!(
            group.get_property("view").unwrap_err(),
            PropertyError::NotAProperty { path: "view".into() }
        );
        assert!(matches!(
            group.get_property("view/missing"),
            Err(PropertyError::Unknown { .. })
        ));
    }

    #[test]
    fn test_group_condition_fires_for_nested_change() {
        let group = sample();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = group.subscribe(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        group.get_property("view/deep/depth").unwrap().set(4);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        group.add_property("extra", "", true).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_removed_property_no_longer_notifies() {
        let group = sample();
        let threshold = group.get_property("threshold").unwrap();
        assert!(group.remove("threshold"));
        assert!(!group.remove("threshold"));

        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = group.subscribe(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        threshold.set(1.0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_information_group_marks_children() {
        let info = PropertyGroup::new("Information", "").unwrap();
        info.set_purpose(PropertyPurpose::Information);
        let p = info.add_property("count", "", 0).unwrap();
        assert_eq!(p.purpose(), PropertyPurpose::Information);
    }

    #[test]
    fn test_clone_is_deep() {
        let group = sample();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = group.subscribe(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        let copy = group.clone_group();
        let copied = copy.get_property("view/deep/depth").unwrap();
        assert_eq!(copied.get_as::<i32>(), Some(3));
        copied.set(10);

        assert_eq!(group.get_property("view/deep/depth").unwrap().get_as::<i32>(), Some(3));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let paths: Vec<String> = copy.flatten().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["threshold", "view/opacity", "view/deep/depth"]);
    }
}
