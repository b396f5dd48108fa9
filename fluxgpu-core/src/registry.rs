//! Resource registry: label ↔ weak handle lookup for debugging/introspection.
//!
//! Real device resources are owned by `Arc` at the API boundary (see
//! `crate::buffer`, `crate::image`); this registry never participates in
//! that ownership, it only remembers which live handle a label currently
//! points at so a caller can look resources up by name or enumerate what is
//! currently alive. One `Registry<T>` exists per resource kind that supports
//! labelling, held optionally on `Context` (enabled by
//! `ContextFlags::RESOURCE_REGISTRY`).

use std::sync::{Arc, Weak};

use indexmap::IndexMap;

pub struct Registry<T> {
    entries: parking_lot::RwLock<IndexMap<String, Weak<T>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: parking_lot::RwLock::new(IndexMap::new()),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` under `label`. A pre-existing entry under the same
    /// label is silently replaced, matching how the source toolchain treats
    /// re-use of a debug label as "most recent wins".
    pub fn insert(&self, label: &str, handle: &Arc<T>) {
        self.entries
            .write()
            .insert(label.to_string(), Arc::downgrade(handle));
    }

    pub fn remove(&self, label: &str) {
        self.entries.write().shift_remove(label);
    }

    /// Old label is removed, new label inserted pointing at the same
    /// handle, iff the handle is still alive.
    pub fn relabel(&self, old_label: &str, new_label: &str) {
        let mut entries = self.entries.write();
        if let Some(weak) = entries.shift_remove(old_label) {
            if weak.strong_count() > 0 {
                entries.insert(new_label.to_string(), weak);
            }
        }
    }

    pub fn get(&self, label: &str) -> Option<Arc<T>> {
        self.entries.read().get(label).and_then(Weak::upgrade)
    }

    /// Current labels with a still-live handle. Dead entries are pruned
    /// lazily rather than eagerly, since nothing here runs on a timer.
    pub fn labels(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(label, _)| label.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_relabel_remove() {
        let registry: Registry<u32> = Registry::new();
        let handle = Arc::new(7u32);
        registry.insert("a", &handle);
        assert_eq!(*registry.get("a").unwrap(), 7);

        registry.relabel("a", "b");
        assert!(registry.get("a").is_none());
        assert_eq!(*registry.get("b").unwrap(), 7);

        registry.remove("b");
        assert!(registry.get("b").is_none());
    }

    #[test]
    fn dead_handle_does_not_resolve() {
        let registry: Registry<u32> = Registry::new();
        {
            let handle = Arc::new(1u32);
            registry.insert("gone", &handle);
        }
        assert!(registry.get("gone").is_none());
        assert!(registry.labels().is_empty());
    }
}
