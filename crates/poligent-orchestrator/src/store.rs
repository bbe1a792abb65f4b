//! Holder of the current desired state
//!
//! The desired state is replaced wholesale, never edited in place. Readers
//! take an `Arc` snapshot, so a cycle that started before a reload keeps
//! working against the state it started with.

use std::sync::{Arc, PoisonError, RwLock};

use poligent_core::DesiredState;

/// Process-wide desired state, absent until the first successful load
pub struct DesiredStateStore {
    current: RwLock<Option<Arc<DesiredState>>>,
}

impl DesiredStateStore {
    /// Store with nothing loaded yet
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Current snapshot, if anything has been loaded
    pub fn current(&self) -> Option<Arc<DesiredState>> {
        // The slot only ever holds a complete snapshot, so a poisoned lock
        // still guards a consistent value
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a new desired state, returning the new snapshot
    pub fn replace(&self, desired: DesiredState) -> Arc<DesiredState> {
        let desired = Arc::new(desired);
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&desired));
        desired
    }
}

impl Default for DesiredStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desired(json: &str) -> DesiredState {
        DesiredState::from_json_str(json).unwrap()
    }

    #[test]
    fn test_starts_unloaded() {
        let store = DesiredStateStore::new();
        assert!(store.current().is_none());
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let store = DesiredStateStore::new();
        store.replace(desired(r#"{"a": {}}"#));
        let before = store.current().unwrap();

        let returned = store.replace(desired(r#"{"b": {}}"#));
        let after = store.current().unwrap();

        assert!(before.contains("a"));
        assert!(!before.contains("b"));
        assert!(after.contains("b"));
        assert!(!after.contains("a"));
        assert!(Arc::ptr_eq(&returned, &after));
    }
}
