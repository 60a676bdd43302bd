//! Transaction context: staged writes and lifecycle state
//!
//! A transaction stages puts and deletes in call order. Nothing is visible
//! to readers until the manager commits it. Staged keys and values are
//! retained `Buffer` handles, so the caller may release or keep appending to
//! its own handles without affecting what gets committed.

use logdb_core::{Buffer, Error, Result, TxnId, WriteKind};
use logdb_durability::RecordEntry;
use std::time::{Duration, Instant};

/// Status of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Accepting writes
    Active,
    /// Commit in progress
    Committing,
    /// Committed successfully
    Committed,
    /// Rolled back, or its commit failed
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },
}

/// One staged write.
#[derive(Debug, Clone)]
pub struct StagedWrite {
    /// Put or delete
    pub kind: WriteKind,
    /// Retained key
    pub key: Buffer,
    /// Retained value; `None` for a delete
    pub value: Option<Buffer>,
}

/// Summary of buffered operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingOperations {
    /// Number of staged puts
    pub puts: usize,
    /// Number of staged deletes
    pub deletes: usize,
    /// Key and value bytes staged
    pub bytes: usize,
}

impl PendingOperations {
    /// Total staged operations
    pub fn total(&self) -> usize {
        self.puts + self.deletes
    }

    /// True if nothing is staged
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// A write transaction.
///
/// # Lifecycle
///
/// 1. **BEGIN**: created by `TransactionManager::begin`, status `Active`
/// 2. **WRITE**: `put()` and `delete()` stage writes in order
/// 3. **END**: the manager commits (`Committed`, or `Aborted` if the commit
///    fails) or rolls back (`Aborted`)
#[derive(Debug)]
pub struct TransactionContext {
    /// Transaction id, written into the commit record
    pub txn_id: TxnId,
    status: TransactionStatus,
    writes: Vec<StagedWrite>,
    start_time: Instant,
}

impl TransactionContext {
    /// Create an active transaction
    pub fn new(txn_id: TxnId) -> Self {
        TransactionContext {
            txn_id,
            status: TransactionStatus::Active,
            writes: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Stage a put of `key` → `value`.
    ///
    /// Both buffers are retained. Fails with `UseAfterFree` if either handle
    /// was released.
    pub fn put(&mut self, key: &Buffer, value: &Buffer) -> Result<()> {
        self.ensure_active()?;
        let key = key.retain()?;
        let value = value.retain()?;
        self.writes.push(StagedWrite {
            kind: WriteKind::Put,
            key,
            value: Some(value),
        });
        Ok(())
    }

    /// Stage a delete of `key`.
    pub fn delete(&mut self, key: &Buffer) -> Result<()> {
        self.ensure_active()?;
        let key = key.retain()?;
        self.writes.push(StagedWrite {
            kind: WriteKind::Delete,
            key,
            value: None,
        });
        Ok(())
    }

    /// Staged writes in call order
    pub fn writes(&self) -> &[StagedWrite] {
        &self.writes
    }

    /// Borrow the staged writes as record entries
    pub fn record_entries(&self) -> Result<Vec<RecordEntry<'_>>> {
        self.writes
            .iter()
            .map(|w| {
                let key = w.key.data()?;
                Ok(match &w.value {
                    Some(value) => RecordEntry::put(key, value.data()?),
                    None => RecordEntry::delete(key),
                })
            })
            .collect()
    }

    // === State Management ===

    /// Current status
    pub fn status(&self) -> &TransactionStatus {
        &self.status
    }

    /// Check if transaction is in Active state
    pub fn is_active(&self) -> bool {
        matches!(self.status, TransactionStatus::Active)
    }

    /// Check if transaction is committed
    pub fn is_committed(&self) -> bool {
        matches!(self.status, TransactionStatus::Committed)
    }

    /// Check if transaction is aborted
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, TransactionStatus::Aborted { .. })
    }

    /// Fails with `NoActiveTransaction` unless the transaction is Active
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::NoActiveTransaction)
        }
    }

    /// `Active` → `Committing`
    pub fn mark_committing(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.status = TransactionStatus::Committing;
        Ok(())
    }

    /// `Committing` → `Committed`. Staged writes are released.
    pub fn mark_committed(&mut self) -> Result<()> {
        match self.status {
            TransactionStatus::Committing => {
                self.status = TransactionStatus::Committed;
                self.writes.clear();
                Ok(())
            }
            _ => Err(Error::NoActiveTransaction),
        }
    }

    /// `Active` or `Committing` → `Aborted`. Staged writes are released.
    pub fn mark_aborted(&mut self, reason: impl Into<String>) -> Result<()> {
        match self.status {
            TransactionStatus::Active | TransactionStatus::Committing => {
                self.status = TransactionStatus::Aborted {
                    reason: reason.into(),
                };
                self.writes.clear();
                Ok(())
            }
            _ => Err(Error::NoActiveTransaction),
        }
    }

    /// Counts of staged operations
    pub fn pending_operations(&self) -> PendingOperations {
        let mut pending = PendingOperations::default();
        for write in &self.writes {
            match write.kind {
                WriteKind::Put => pending.puts += 1,
                WriteKind::Delete => pending.deletes += 1,
            }
            pending.bytes += write.key.len().unwrap_or(0);
            if let Some(value) = &write.value {
                pending.bytes += value.len().unwrap_or(0);
            }
        }
        pending
    }

    /// Time since the transaction began
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}
