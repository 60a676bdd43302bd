//! Connection: the handle applications hold on an open log
//!
//! # Lifecycle
//!
//! ```text
//! open ──► (begin ──► put/delete* ──► commit | rollback)* ──► close
//!                 iterate_all / get at any point while open
//! ```
//!
//! `open` takes an exclusive `fs2` lock on the log file; a second open of
//! the same file, from this process or another, fails until the first
//! connection closes. `close` rolls back an open transaction, fsyncs and
//! releases the lock. Every other operation on a closed connection fails
//! with `ObjectDisposed`. Dropping a connection closes it.

use crate::iterator::SnapshotIterator;
use crate::options::{OpenMode, OpenOptions};
use logdb_concurrency::{TransactionContext, TransactionManager};
use logdb_core::{Buffer, Error, Result};
#[cfg(feature = "fault-injection")]
use logdb_durability::FailPoint;
use logdb_durability::{DurabilityMode, LogCounters, RecoveryStats};
use logdb_storage::LogStore;
use parking_lot::{Mutex, MutexGuard};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DISPOSED: &str = "Connection";

struct ConnectionState {
    /// `None` once closed
    store: Option<LogStore>,
    manager: TransactionManager,
    active: Option<TransactionContext>,
}

/// An open log.
pub struct Connection {
    path: PathBuf,
    durability: DurabilityMode,
    state: Mutex<ConnectionState>,
}

impl Connection {
    /// Open the log at `path`.
    ///
    /// # Errors
    ///
    /// `Error::Open` if the path cannot be opened in `mode`, the file is
    /// locked by another connection, or it is not a log file.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Connection> {
        OpenOptions::new().mode(mode).open(path)
    }

    pub(crate) fn open_with(path: &Path, options: &OpenOptions) -> Result<Connection> {
        let mut fs_options = std::fs::OpenOptions::new();
        fs_options.read(true).write(true);
        if options.mode == OpenMode::Create {
            fs_options.create(true);
        }
        let file = fs_options
            .open(path)
            .map_err(|e| Error::open(path, e.to_string()))?;

        fs2::FileExt::try_lock_exclusive(&file)
            .map_err(|_| Error::open(path, "log is already in use by another connection"))?;

        // Only truncate once the lock is held
        let file = if options.truncate {
            let fresh = replace_with_empty(path)?;
            drop(file);
            fresh
        } else {
            file
        };

        let durability = options.durability_mode();
        let store = LogStore::open(file, path, durability).map_err(|e| match e {
            Error::Open { .. } => e,
            other => Error::open(path, other.to_string()),
        })?;
        let manager = TransactionManager::resume_after(store.last_recovered_txn_id());

        info!(
            target: "logdb::connection",
            path = %path.display(),
            keys = store.len(),
            durability = durability.description(),
            truncated = options.truncate,
            "Opened log"
        );

        Ok(Connection {
            path: path.to_path_buf(),
            durability,
            state: Mutex::new(ConnectionState {
                store: Some(store),
                manager,
                active: None,
            }),
        })
    }

    /// Lock the state, failing if the connection is closed
    fn lock_open(&self) -> Result<MutexGuard<'_, ConnectionState>> {
        let state = self.state.lock();
        if state.store.is_none() {
            return Err(Error::ObjectDisposed(DISPOSED));
        }
        Ok(state)
    }

    /// Close the connection. Idempotent.
    ///
    /// An open transaction is rolled back. The log is fsynced and its lock
    /// released even if the final fsync fails; that failure is returned.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        let Some(store) = state.store.take() else {
            return Ok(());
        };

        if let Some(mut txn) = state.active.take() {
            warn!(
                target: "logdb::connection",
                txn = %txn.txn_id,
                pending = txn.pending_operations().total(),
                "Rolling back open transaction at close"
            );
            state.manager.rollback(&mut txn)?;
        }

        let synced = store.sync();
        info!(
            target: "logdb::connection",
            path = %self.path.display(),
            commits = state.manager.commit_count(),
            "Closed log"
        );
        drop(store);
        synced
    }

    /// True once `close` has run
    pub fn is_closed(&self) -> bool {
        self.state.lock().store.is_none()
    }

    // === Transactions ===

    /// Start a write transaction.
    ///
    /// # Errors
    ///
    /// `TransactionAlreadyActive` if one is already open.
    pub fn begin_transaction(&self) -> Result<()> {
        let mut state = self.lock_open()?;
        if state.active.is_some() {
            return Err(Error::TransactionAlreadyActive);
        }
        let txn = state.manager.begin();
        state.active = Some(txn);
        Ok(())
    }

    /// Stage a put. The buffers are retained, not copied.
    pub fn put(&self, key: &Buffer, value: &Buffer) -> Result<()> {
        let mut state = self.lock_open()?;
        state
            .active
            .as_mut()
            .ok_or(Error::NoActiveTransaction)?
            .put(key, value)
    }

    /// Stage a delete.
    pub fn delete(&self, key: &Buffer) -> Result<()> {
        let mut state = self.lock_open()?;
        state
            .active
            .as_mut()
            .ok_or(Error::NoActiveTransaction)?
            .delete(key)
    }

    /// Commit the open transaction.
    ///
    /// On `Error::Commit` nothing from the transaction is visible and the
    /// transaction is over; begin a new one to retry.
    pub fn commit_transaction(&self) -> Result<()> {
        let mut state = self.lock_open()?;
        let mut txn = state.active.take().ok_or(Error::NoActiveTransaction)?;
        let ConnectionState { store, manager, .. } = &mut *state;
        let store = store.as_ref().ok_or(Error::ObjectDisposed(DISPOSED))?;
        manager.commit(&mut txn, store).map(|_| ())
    }

    /// Discard the open transaction's staged writes.
    pub fn rollback_transaction(&self) -> Result<()> {
        let mut state = self.lock_open()?;
        let mut txn = state.active.take().ok_or(Error::NoActiveTransaction)?;
        state.manager.rollback(&mut txn)
    }

    /// True if a transaction is open
    pub fn has_active_transaction(&self) -> bool {
        self.state.lock().active.is_some()
    }

    /// Run `f` inside a transaction: commit if it returns `Ok`, roll back if
    /// it returns `Err`.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        self.begin_transaction()?;
        match f(self) {
            Ok(value) => {
                self.commit_transaction()?;
                Ok(value)
            }
            Err(e) => {
                if self.has_active_transaction() {
                    if let Err(rollback_err) = self.rollback_transaction() {
                        warn!(
                            target: "logdb::connection",
                            error = %rollback_err,
                            "Rollback after failed transaction body also failed"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    // === Reads ===

    /// Iterate over a snapshot of all committed keys, in first-commit order.
    ///
    /// The iterator does not see later commits and stays usable after the
    /// connection closes.
    pub fn iterate_all(&self) -> Result<SnapshotIterator> {
        let state = self.lock_open()?;
        let store = state.store.as_ref().ok_or(Error::ObjectDisposed(DISPOSED))?;
        Ok(SnapshotIterator::new(store.snapshot()))
    }

    /// Latest committed value for `key`. Staged writes are not visible.
    pub fn get(&self, key: &[u8]) -> Result<Option<Buffer>> {
        let state = self.lock_open()?;
        let store = state.store.as_ref().ok_or(Error::ObjectDisposed(DISPOSED))?;
        Ok(store.get(key)?.map(Buffer::from_vec))
    }

    /// Number of committed live keys
    pub fn len(&self) -> Result<usize> {
        let state = self.lock_open()?;
        Ok(state.store.as_ref().map_or(0, LogStore::len))
    }

    /// True if no keys are committed
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // === Introspection ===

    /// Path the connection was opened on
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durability mode in effect
    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability
    }

    /// Cumulative log writer counters
    pub fn log_counters(&self) -> Result<LogCounters> {
        let state = self.lock_open()?;
        Ok(state
            .store
            .as_ref()
            .map(LogStore::counters)
            .unwrap_or_default())
    }

    /// What recovery found when this connection opened
    pub fn recovery_stats(&self) -> Result<RecoveryStats> {
        let state = self.lock_open()?;
        Ok(state
            .store
            .as_ref()
            .map(|s| s.recovery_stats().clone())
            .unwrap_or_default())
    }

    /// Make the next commit's log append fail at `point`.
    #[cfg(feature = "fault-injection")]
    pub fn inject_log_failure(&self, point: FailPoint) -> Result<()> {
        let state = self.lock_open()?;
        if let Some(store) = state.store.as_ref() {
            store.inject_failure(point);
        }
        Ok(())
    }
}

/// Swap a new, empty, locked file in at `path` and return it.
///
/// The old file is unlinked rather than cut down, so read handles opened on
/// it (snapshot iterators that outlived their connection) keep seeing its
/// contents. The caller must hold the lock on the old file until this
/// returns.
fn replace_with_empty(path: &Path) -> Result<std::fs::File> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::open(path, "path has no file name"))?;
    let mut staging_name = file_name.to_os_string();
    staging_name.push(".truncate");
    let staging = path.with_file_name(staging_name);

    let fresh = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&staging)
        .map_err(|e| Error::open(path, format!("truncate failed: {}", e)))?;
    fs2::FileExt::try_lock_exclusive(&fresh)
        .map_err(|_| Error::open(path, "truncate failed: staging file is locked"))?;
    std::fs::rename(&staging, path)
        .map_err(|e| Error::open(path, format!("truncate failed: {}", e)))?;

    warn!(
        target: "logdb::connection",
        path = %path.display(),
        "Replaced log with an empty file"
    );
    Ok(fresh)
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(
                target: "logdb::connection",
                path = %self.path.display(),
                error = %e,
                "Error closing log on drop"
            );
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.path)
            .field("durability", &self.durability)
            .field("closed", &self.is_closed())
            .finish()
    }
}
