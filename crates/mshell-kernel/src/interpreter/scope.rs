//! Variable bindings for mshell.
//!
//! A [`Variables`] map is shared by reference: the top level and every
//! quotation created there see one map, so `(5 n!) x @n` observes the store.
//! Definition calls get a fresh, empty map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::value::Value;

/// Shared, mutable variable map.
#[derive(Debug, Clone, Default)]
pub struct Variables(Arc<Mutex<HashMap<String, Value>>>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.lock().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.lock().insert(name.into(), value);
    }

    /// All bound names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// True if both handles refer to the same map.
    pub fn same_scope(&self, other: &Variables) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
