//! SnapshotIterator: cursor over committed data as of its creation
//!
//! # Protocol
//!
//! ```text
//! let mut it = conn.iterate_all()?;
//! while it.advance()? {
//!     let key = it.current_key()?;
//!     let value = it.current_value()?;
//! }
//! ```
//!
//! `current_key`/`current_value` fail with `InvalidIteratorState` before
//! the first successful `advance` and after `advance` has returned `false`.
//! Keys come from the index without copying. Values are read from the log
//! the first time they are asked for and cached for the current entry.
//!
//! The iterator owns an `Arc` of the index version it was created from, so
//! later commits are invisible to it and it never blocks the writer.

use logdb_core::{Buffer, Error, RecordLocation, Result};
use logdb_storage::IndexSnapshot;
use std::sync::Arc;

const DISPOSED: &str = "SnapshotIterator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    BeforeFirst,
    At(usize),
    Exhausted,
}

#[derive(Debug)]
struct CurrentEntry {
    key: Buffer,
    location: RecordLocation,
    value: Option<Buffer>,
}

/// Iterator over a snapshot of all committed keys, in first-commit order.
#[derive(Debug)]
pub struct SnapshotIterator {
    /// `None` once released
    snapshot: Option<IndexSnapshot>,
    cursor: Cursor,
    current: Option<CurrentEntry>,
}

impl SnapshotIterator {
    pub(crate) fn new(snapshot: IndexSnapshot) -> Self {
        SnapshotIterator {
            snapshot: Some(snapshot),
            cursor: Cursor::BeforeFirst,
            current: None,
        }
    }

    /// Move to the next entry. Returns `false` once the snapshot is exhausted,
    /// and on every call after that.
    pub fn advance(&mut self) -> Result<bool> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or(Error::ObjectDisposed(DISPOSED))?;

        let from = match self.cursor {
            Cursor::BeforeFirst => 0,
            Cursor::At(slot) => slot + 1,
            Cursor::Exhausted => return Ok(false),
        };

        self.current = None;
        match snapshot.next_live(from) {
            Some((slot, entry)) => {
                let location = entry
                    .location
                    .ok_or_else(|| Error::iteration("live slot without a location"))?;
                self.current = Some(CurrentEntry {
                    key: Buffer::direct(Arc::clone(&entry.key), drop),
                    location,
                    value: None,
                });
                self.cursor = Cursor::At(slot);
                Ok(true)
            }
            None => {
                self.cursor = Cursor::Exhausted;
                Ok(false)
            }
        }
    }

    fn current(&self) -> Result<&CurrentEntry> {
        if self.snapshot.is_none() {
            return Err(Error::ObjectDisposed(DISPOSED));
        }
        self.current.as_ref().ok_or(Error::InvalidIteratorState)
    }

    /// Key of the current entry, as a new retained handle
    pub fn current_key(&self) -> Result<Buffer> {
        self.current()?.key.retain()
    }

    /// Value of the current entry, as a new retained handle.
    ///
    /// # Errors
    ///
    /// - `InvalidIteratorState` if not positioned on an entry
    /// - `Iteration` if the value cannot be read from the log
    pub fn current_value(&mut self) -> Result<Buffer> {
        let location = self.current()?.location;
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or(Error::ObjectDisposed(DISPOSED))?;
        let current = self.current.as_mut().ok_or(Error::InvalidIteratorState)?;

        if current.value.is_none() {
            let bytes = snapshot.read_value(location).map_err(|e| {
                Error::iteration(format!(
                    "failed to read value at offset {}: {}",
                    location.offset, e
                ))
            })?;
            current.value = Some(Buffer::from_vec(bytes));
        }

        match &current.value {
            Some(value) => value.retain(),
            None => Err(Error::InvalidIteratorState),
        }
    }

    /// Number of live keys in the snapshot
    pub fn snapshot_len(&self) -> Result<usize> {
        self.snapshot
            .as_ref()
            .map(IndexSnapshot::len)
            .ok_or(Error::ObjectDisposed(DISPOSED))
    }

    /// Drop the snapshot and any cached entry. Idempotent.
    pub fn release(&mut self) {
        self.current = None;
        self.snapshot = None;
        self.cursor = Cursor::Exhausted;
    }

    /// True once released
    pub fn is_released(&self) -> bool {
        self.snapshot.is_none()
    }
}

impl Iterator for SnapshotIterator {
    type Item = Result<(Buffer, Buffer)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_released() {
            return None;
        }
        match self.advance() {
            Ok(true) => Some(
                self.current_key()
                    .and_then(|key| self.current_value().map(|value| (key, value))),
            ),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
