//! IndexSnapshot: point-in-time view of committed data
//!
//! A snapshot is two `Arc`s: the index as it was when the snapshot was taken,
//! and the shared value reader. Creating one is O(1) and never blocks the
//! writer. Later commits publish a new index and leave this one untouched.
//!
//! The reader is shared with the store, so a snapshot remains readable after
//! its store is closed.

use crate::index::{IndexEntry, KeyIndex};
use logdb_core::{Error, RecordLocation, Result};
use logdb_durability::ValueReader;
use std::fmt;
use std::sync::Arc;

/// Immutable view of the index plus the means to read values.
#[derive(Clone)]
pub struct IndexSnapshot {
    index: Arc<KeyIndex>,
    reader: Arc<ValueReader>,
}

impl IndexSnapshot {
    pub(crate) fn new(index: Arc<KeyIndex>, reader: Arc<ValueReader>) -> Self {
        IndexSnapshot { index, reader }
    }

    /// Number of live keys in the snapshot
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if the snapshot holds no live keys
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Read `key`'s value as of this snapshot
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.index.get(key) {
            Some(location) => self.read_value(location).map(Some),
            None => Ok(None),
        }
    }

    /// First live slot at or after `from`, in first-commit order
    pub fn next_live(&self, from: usize) -> Option<(usize, &IndexEntry)> {
        self.index.next_live(from)
    }

    /// Read value bytes from the log
    pub fn read_value(&self, location: RecordLocation) -> Result<Vec<u8>> {
        self.reader.read(location).map_err(Error::from)
    }

    /// True if both snapshots share the same index version
    pub fn same_version(&self, other: &IndexSnapshot) -> bool {
        Arc::ptr_eq(&self.index, &other.index)
    }
}

impl fmt::Debug for IndexSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSnapshot")
            .field("live_keys", &self.index.len())
            .field("slots", &self.index.slot_count())
            .field("path", &self.reader.path())
            .finish()
    }
}
