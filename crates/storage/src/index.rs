//! Key index in first-commit order
//!
//! Entries live in a `Vec` in the order each key was first committed; a
//! hash map from key bytes to slot gives O(1) lookups. Overwrites update the
//! slot in place. Deletes leave a tombstone in the slot, so a key that is
//! deleted and later put again keeps its original position.

use logdb_core::{RecordLocation, WriteKind};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// One key's slot in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Key bytes, shared with the position map
    pub key: Arc<[u8]>,
    /// Location of the latest committed value; `None` is a tombstone
    pub location: Option<RecordLocation>,
}

impl IndexEntry {
    /// True if the key is currently deleted
    pub fn is_tombstone(&self) -> bool {
        self.location.is_none()
    }
}

/// In-memory index from key to value location.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    entries: Vec<IndexEntry>,
    positions: FxHashMap<Arc<[u8]>, usize>,
    live: usize,
}

impl KeyIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one committed write.
    ///
    /// For a delete, `location` is ignored. Deleting a key that was never
    /// committed is a no-op.
    pub fn apply(&mut self, kind: WriteKind, key: &[u8], location: RecordLocation) {
        match kind {
            WriteKind::Put => self.put(key, location),
            WriteKind::Delete => self.delete(key),
        }
    }

    fn put(&mut self, key: &[u8], location: RecordLocation) {
        match self.positions.get(key) {
            Some(&slot) => {
                let entry = &mut self.entries[slot];
                if entry.location.is_none() {
                    self.live += 1;
                }
                entry.location = Some(location);
            }
            None => {
                let key: Arc<[u8]> = Arc::from(key);
                self.positions.insert(Arc::clone(&key), self.entries.len());
                self.entries.push(IndexEntry {
                    key,
                    location: Some(location),
                });
                self.live += 1;
            }
        }
    }

    fn delete(&mut self, key: &[u8]) {
        if let Some(&slot) = self.positions.get(key) {
            let entry = &mut self.entries[slot];
            if entry.location.take().is_some() {
                self.live -= 1;
            }
        }
    }

    /// Location of the latest value for `key`, if it is live
    pub fn get(&self, key: &[u8]) -> Option<RecordLocation> {
        self.positions
            .get(key)
            .and_then(|&slot| self.entries[slot].location)
    }

    /// True if `key` has a live value
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.live
    }

    /// True if there are no live keys
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots, tombstones included
    pub fn slot_count(&self) -> usize {
        self.entries.len()
    }

    /// Slot `slot`, tombstone or not
    pub fn slot(&self, slot: usize) -> Option<&IndexEntry> {
        self.entries.get(slot)
    }

    /// First live slot at or after `from`
    pub fn next_live(&self, from: usize) -> Option<(usize, &IndexEntry)> {
        self.entries
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, e)| !e.is_tombstone())
    }

    /// Live entries in first-commit order
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], RecordLocation)> + '_ {
        self.entries
            .iter()
            .filter_map(|e| e.location.map(|loc| (&e.key[..], loc)))
    }
}
