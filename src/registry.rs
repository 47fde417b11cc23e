//! Insertion-ordered, string-keyed registry
//!
//! Backs the event, function and configuration-parameter tables of the
//! self-description. Iteration follows insertion order so the serialized
//! self-description is deterministic.

use indexmap::map::{Iter, Values};
use indexmap::IndexMap;

/// An ordered map from string ids to entries, rejecting duplicate ids
#[derive(Debug, Clone)]
pub struct Registry<V> {
    entries: IndexMap<String, V>,
}

impl<V> Default for Registry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Registry<V> {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Add an entry at the end. Returns the value back if the id is taken.
    pub fn insert(&mut self, id: impl Into<String>, value: V) -> Result<(), V> {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return Err(value);
        }
        self.entries.insert(id, value);
        Ok(())
    }

    /// Remove an entry, keeping the relative order of the others
    pub fn remove(&mut self, id: &str) -> Option<V> {
        self.entries.shift_remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&V> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut V> {
        self.entries.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn iter(&self) -> Iter<'_, String, V> {
        self.entries.iter()
    }

    pub fn values(&self) -> Values<'_, String, V> {
        self.entries.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
