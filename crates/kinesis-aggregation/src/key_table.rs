// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Deduplicated key tables backing the `partition_key_table` and
//! `explicit_hash_key_table` fields of an aggregated record.

use fnv::FnvBuildHasher;
use hashbrown::HashMap;

/// Outcome of [`KeyTable::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInsertion {
    /// `true` when the key was not in the table before this call.
    pub is_new: bool,
    /// Stable index of the key in the table.
    pub index: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeyEntry {
    index: u64,
    count: u64,
}

/// Ordered set of unique keys. A key keeps the index it was first assigned
/// for as long as the table lives.
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    keys: Vec<String>,
    lookup: HashMap<String, KeyEntry, FnvBuildHasher>,
}

impl PartialEq for KeyTable {
    fn eq(&self, other: &Self) -> bool {
        self.keys == other.keys && self.lookup == other.lookup
    }
}

impl Eq for KeyTable {}

impl KeyTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `key` has, or would receive if it were added next.
    #[must_use]
    pub fn potential_index(&self, key: &str) -> u64 {
        match self.lookup.get(key) {
            Some(entry) => entry.index,
            None => self.keys.len() as u64,
        }
    }

    #[must_use]
    pub fn contains(&self, key: Option<&str>) -> bool {
        key.is_some_and(|k| self.lookup.contains_key(k))
    }

    pub fn add(&mut self, key: &str) -> KeyInsertion {
        if let Some(entry) = self.lookup.get_mut(key) {
            entry.count += 1;
            return KeyInsertion {
                is_new: false,
                index: entry.index,
            };
        }

        let index = self.keys.len() as u64;
        self.lookup
            .insert(key.to_string(), KeyEntry { index, count: 1 });
        self.keys.push(key.to_string());
        KeyInsertion {
            is_new: true,
            index,
        }
    }

    /// Number of times `key` was added. Diagnostic only.
    #[must_use]
    pub fn count(&self, key: &str) -> u64 {
        self.lookup.get(key).map_or(0, |entry| entry.count)
    }

    /// Unique keys in index order.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    #[must_use]
    pub fn get(&self, index: u64) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.keys.get(i))
            .map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.lookup.clear();
    }
}
