//! Table implementation
//!
//! An ordered, insertion-preserving list of entries with first-match lookup.

use super::{Entry, Matcher, Value};

/// A named sequence of entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    entries: Vec<Entry>,
}

impl Table {
    /// Create a new empty table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// All entries in insertion order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry whose key equals `key`
    pub fn get(&self, key: &Value) -> Option<&Entry> {
        self.entries.iter().find(|entry| &entry.key == key)
    }

    /// Append an entry (duplicate keys allowed)
    pub fn insert(&mut self, key: Value, value: Value) {
        self.entries.push(Entry { key, value });
    }

    /// Overwrite the value of the first matching entry
    ///
    /// Returns false if no entry has this key.
    pub fn update(&mut self, key: &Value, value: Value) -> bool {
        match self.entries.iter_mut().find(|entry| &entry.key == key) {
            Some(entry) => {
                entry.value = value;
                true
            }
            None => false,
        }
    }

    /// Update the first match, or append when the key is absent
    pub fn upsert(&mut self, key: Value, value: Value) {
        if !self.update(&key, value.clone()) {
            self.insert(key, value);
        }
    }

    /// Remove the first matching entry
    pub fn remove(&mut self, key: &Value) -> Option<Entry> {
        let position = self.entries.iter().position(|entry| &entry.key == key)?;
        Some(self.entries.remove(position))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|entry| &entry.key)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|entry| &entry.value)
    }

    // =========================================================================
    // Pattern Operations
    // =========================================================================

    /// Clone every entry the matcher accepts, in insertion order
    pub fn find_matching(&self, matcher: &Matcher) -> Vec<Entry> {
        self.entries
            .iter()
            .filter(|entry| matcher.matches(entry))
            .cloned()
            .collect()
    }

    /// Overwrite the value of every matching entry, returning the count
    pub fn update_matching(&mut self, matcher: &Matcher, value: &Value) -> usize {
        let mut updated = 0;
        for entry in self.entries.iter_mut() {
            if matcher.matches(entry) {
                entry.value = value.clone();
                updated += 1;
            }
        }
        updated
    }

    /// Remove every matching entry, returning the count
    ///
    /// Compacts in place with `retain`, so removing one match never causes
    /// the next one to be skipped.
    pub fn remove_matching(&mut self, matcher: &Matcher) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !matcher.matches(entry));
        before - self.entries.len()
    }
}
