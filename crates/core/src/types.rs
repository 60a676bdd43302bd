//! Shared identifiers and location types
//!
//! These types flow between the durability, storage and concurrency crates:
//! - TxnId: monotonically increasing commit identifier
//! - WriteKind: discriminates puts from deletes (tombstones)
//! - RecordLocation: where a committed value's bytes live in the log

use std::fmt;

/// Transaction identifier.
///
/// Assigned by the transaction manager at `begin`, written into every commit
/// record, and used at recovery to resume numbering after the last committed
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TxnId(pub u64);

impl TxnId {
    /// The id that follows this one
    pub fn next(self) -> TxnId {
        TxnId(self.0 + 1)
    }

    /// Raw value
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Kind of a staged or logged write.
///
/// A Delete writes a tombstone: the key stays in the index, marked as deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WriteKind {
    /// A normal put
    Put = 0x01,
    /// A delete (tombstone marker)
    Delete = 0x02,
}

impl WriteKind {
    /// Tag byte used in the log encoding
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Parse a tag byte from the log
    pub fn from_byte(byte: u8) -> Option<WriteKind> {
        match byte {
            0x01 => Some(WriteKind::Put),
            0x02 => Some(WriteKind::Delete),
            _ => None,
        }
    }
}

/// Location of a committed value inside the log file.
///
/// `offset` is the absolute file offset of the first value byte. Records are
/// never rewritten, so a location stays valid for the life of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordLocation {
    /// Absolute file offset of the value bytes
    pub offset: u64,
    /// Length of the value in bytes
    pub len: u32,
}

impl RecordLocation {
    /// Create a new location
    pub fn new(offset: u64, len: u32) -> Self {
        RecordLocation { offset, len }
    }

    /// Offset one past the last value byte
    pub fn end(&self) -> u64 {
        self.offset + self.len as u64
    }
}
