//! Insertion-ordered record of what a committee was asked to vote on.

use dualgov_types::ActionHash;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct ProposalsList<T> {
    keys: Vec<ActionHash>,
    entries: HashMap<ActionHash, T>,
}

impl<T> Default for ProposalsList<T> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            entries: HashMap::new(),
        }
    }
}

impl<T> ProposalsList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` under `key`. The first entry for a key wins; returns
    /// whether anything was added.
    pub fn push(&mut self, key: ActionHash, value: T) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.keys.push(key);
        self.entries.insert(key, value);
        true
    }

    pub fn contains(&self, key: &ActionHash) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &ActionHash) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn get_at(&self, index: usize) -> Option<(ActionHash, &T)> {
        let key = *self.keys.get(index)?;
        self.entries.get(&key).map(|value| (key, value))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in insertion order, `limit` of them starting at `offset`.
    pub fn ordered_keys(&self, offset: usize, limit: usize) -> &[ActionHash] {
        let start = offset.min(self.keys.len());
        let end = start.saturating_add(limit).min(self.keys.len());
        &self.keys[start..end]
    }

    pub fn page(&self, offset: usize, limit: usize) -> Vec<(ActionHash, &T)> {
        self.ordered_keys(offset, limit)
            .iter()
            .filter_map(|key| self.entries.get(key).map(|value| (*key, value)))
            .collect()
    }
}
