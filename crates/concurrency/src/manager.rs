//! Transaction manager for coordinating commit operations
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. mark_committing()      - Active → Committing
//! 2. IF no staged writes:   - Committed, log untouched
//! 3. store.commit()         - encode one record, single append, fsync per
//!                             durability mode, publish index (DURABILITY POINT)
//! 4. mark_committed()       - Committing → Committed
//! ```
//!
//! If step 3 fails the store has already cut the log back to its previous
//! end and left the published index alone. The transaction is marked
//! Aborted: a failed commit consumes it just like a rollback would.

use crate::transaction::TransactionContext;
use logdb_core::{Result, TxnId};
use logdb_storage::{CommitReceipt, LogStore};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error};

/// Result of a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing was staged; the log was not touched
    Empty,
    /// The record was appended and published
    Durable(CommitReceipt),
}

impl CommitOutcome {
    /// Receipt of the appended record, if any
    pub fn receipt(&self) -> Option<&CommitReceipt> {
        match self {
            CommitOutcome::Empty => None,
            CommitOutcome::Durable(receipt) => Some(receipt),
        }
    }
}

/// Allocates transaction ids and runs the commit protocol.
#[derive(Debug)]
pub struct TransactionManager {
    /// Next transaction ID
    ///
    /// Starts after the highest id found in the log so ids stay unique
    /// across reopen. Rolled-back transactions leave gaps.
    next_txn_id: AtomicU64,
    commits: AtomicU64,
    aborts: AtomicU64,
}

impl TransactionManager {
    /// Manager for a fresh log
    pub fn new() -> Self {
        Self::resume_after(None)
    }

    /// Manager whose ids continue after `last`, typically the highest id
    /// found at recovery
    pub fn resume_after(last: Option<TxnId>) -> Self {
        let next = last.map_or(1, |id| id.next().as_u64());
        TransactionManager {
            next_txn_id: AtomicU64::new(next),
            commits: AtomicU64::new(0),
            aborts: AtomicU64::new(0),
        }
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> TxnId {
        TxnId(self.next_txn_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Start a transaction
    pub fn begin(&self) -> TransactionContext {
        let txn = TransactionContext::new(self.next_txn_id());
        debug!(target: "logdb::txn", txn = %txn.txn_id, "Begin");
        txn
    }

    /// Commit `txn` to `store`.
    ///
    /// # Errors
    ///
    /// - `NoActiveTransaction` if `txn` is not Active
    /// - `Commit` if the durable append failed; `txn` is then Aborted
    pub fn commit(&self, txn: &mut TransactionContext, store: &LogStore) -> Result<CommitOutcome> {
        txn.mark_committing()?;

        if txn.writes().is_empty() {
            txn.mark_committed()?;
            self.commits.fetch_add(1, Ordering::Relaxed);
            debug!(target: "logdb::txn", txn = %txn.txn_id, "Committed empty transaction");
            return Ok(CommitOutcome::Empty);
        }

        let result = txn
            .record_entries()
            .and_then(|entries| store.commit(txn.txn_id, &entries));

        match result {
            Ok(receipt) => {
                txn.mark_committed()?;
                self.commits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    target: "logdb::txn",
                    txn = %receipt.txn_id,
                    entries = receipt.entries,
                    offset = receipt.offset,
                    bytes = receipt.len,
                    "Committed"
                );
                Ok(CommitOutcome::Durable(receipt))
            }
            Err(e) => {
                error!(
                    target: "logdb::txn",
                    txn = %txn.txn_id,
                    error = %e,
                    "Commit failed, nothing published"
                );
                txn.mark_aborted(format!("commit failed: {}", e))?;
                self.aborts.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Discard `txn`'s staged writes. The log and index are not touched.
    pub fn rollback(&self, txn: &mut TransactionContext) -> Result<()> {
        let pending = txn.pending_operations();
        txn.mark_aborted("rolled back")?;
        self.aborts.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: "logdb::txn",
            txn = %txn.txn_id,
            discarded = pending.total(),
            "Rolled back"
        );
        Ok(())
    }

    /// Transactions committed through this manager
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Transactions rolled back or failed through this manager
    pub fn abort_count(&self) -> u64 {
        self.aborts.load(Ordering::Relaxed)
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
