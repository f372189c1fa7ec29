//! Namespaces group the data handles found in one directory

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::handle::DataHandle;

/// A data handle shared between the catalog and its callers
pub type SharedHandle = Rc<RefCell<DataHandle>>;

/// Named grouping of data handles for one subdirectory of the catalog root.
///
/// Cloning a namespace clones the map, not the handles: both copies point
/// at the same `DataHandle`s.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    name: String,
    handles: BTreeMap<String, SharedHandle>,
}

impl Namespace {
    /// Create an empty namespace
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handles: BTreeMap::new(),
        }
    }

    /// Directory key, relative to the catalog root
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a handle by short name
    pub fn get(&self, name: &str) -> Option<SharedHandle> {
        self.handles.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }

    /// Short names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.handles.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SharedHandle)> {
        self.handles.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Attach `handle` under `name` unless the slot is taken.
    ///
    /// Returns whether the handle was attached.
    pub(crate) fn insert_if_absent(&mut self, name: String, handle: SharedHandle) -> bool {
        if self.handles.contains_key(&name) {
            return false;
        }
        self.handles.insert(name, handle);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataKind;

    fn handle(path: &str) -> SharedHandle {
        Rc::new(RefCell::new(
            DataHandle::new(path, DataKind::Table, "/data", None).unwrap(),
        ))
    }

    #[test]
    fn test_insert_never_overwrites() {
        let mut ns = Namespace::new("wells");
        assert!(ns.insert_if_absent("depths".to_string(), handle("/data/wells/depths.csv")));
        assert!(!ns.insert_if_absent("depths".to_string(), handle("/data/wells/other.csv")));

        let kept = ns.get("depths").unwrap();
        assert_eq!(
            kept.borrow().path(),
            std::path::Path::new("/data/wells/depths.csv")
        );
        assert_eq!(ns.len(), 1);
    }

    #[test]
    fn test_lookup() {
        let mut ns = Namespace::new("wells");
        ns.insert_if_absent("b".to_string(), handle("/data/wells/b.csv"));
        ns.insert_if_absent("a".to_string(), handle("/data/wells/a.csv"));

        assert_eq!(ns.name(), "wells");
        assert_eq!(ns.names(), vec!["a", "b"]);
        assert!(ns.contains("a"));
        assert!(ns.get("c").is_none());
        assert!(!ns.is_empty());
    }
}
