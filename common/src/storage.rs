use std::collections::HashMap;
use std::sync::Mutex;

/// Key-value capability for UI state that outlives a search session, such as
/// which facets are expanded. Backed by browser storage, a file, or memory.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
    }
}

/// Per-facet expanded/collapsed flags persisted through a [`KeyValueStore`].
pub struct FacetExpansion<S: KeyValueStore> {
    store: S,
    prefix: String,
}

impl<S: KeyValueStore> FacetExpansion<S> {
    pub fn new(store: S, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
        }
    }

    fn key(&self, facet: &str) -> String {
        format!("{}.{}.expanded", self.prefix, facet)
    }

    pub fn is_expanded(&self, facet: &str, default: bool) -> bool {
        match self.store.get(&self.key(facet)).as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        }
    }

    pub fn set_expanded(&self, facet: &str, expanded: bool) {
        self.store
            .set(&self.key(facet), if expanded { "true" } else { "false" });
    }

    /// Flips the stored flag and returns the new value.
    pub fn toggle(&self, facet: &str, default: bool) -> bool {
        let expanded = !self.is_expanded(facet, default);
        self.set_expanded(facet, expanded);
        expanded
    }
}
