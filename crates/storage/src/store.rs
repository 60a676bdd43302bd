//! LogStore: the durable log plus its published index
//!
//! # Commit
//!
//! `commit` runs under the writer lock:
//! 1. encode all writes into one record
//! 2. append it with a single write, fsync per durability mode
//! 3. apply the writes to the index and publish it
//!
//! If 1 or 2 fails the writer has already cut the log back to its previous
//! end and the published index is untouched, so nothing from the failed
//! commit is visible now or after a reopen.

use crate::index::KeyIndex;
use crate::snapshot::IndexSnapshot;
use logdb_core::{Error, RecordLocation, Result, TxnId};
#[cfg(feature = "fault-injection")]
use logdb_durability::FailPoint;
use logdb_durability::{
    encode_record, recover, DurabilityMode, LogCounters, LogWriter, RecordEntry, RecoveryStats,
    ValueReader,
};
use parking_lot::{Mutex, RwLock};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// Where a commit landed in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Transaction id written into the record
    pub txn_id: TxnId,
    /// File offset of the record
    pub offset: u64,
    /// Record length in bytes
    pub len: u64,
    /// Number of entries in the record
    pub entries: usize,
}

/// Durable key-value log with an in-memory index.
pub struct LogStore {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    published: RwLock<Arc<KeyIndex>>,
    reader: Arc<ValueReader>,
    last_txn_id: Option<TxnId>,
    recovery: RecoveryStats,
}

impl LogStore {
    /// Recover the log in `file` and build its index.
    ///
    /// `file` must be open for reading and writing; the caller holds any
    /// lock on it. Values are read through a separate read-only handle on
    /// `path`.
    pub fn open(file: File, path: &Path, durability: DurabilityMode) -> Result<Self> {
        let recovered = recover(file, path, durability)?;

        let mut index = KeyIndex::new();
        for scanned in &recovered.records {
            for entry in &scanned.record.entries {
                let location =
                    RecordLocation::new(scanned.offset + entry.value.offset, entry.value.len);
                index.apply(entry.kind, &entry.key, location);
            }
        }

        let reader = ValueReader::open(path)?;

        Ok(LogStore {
            path: path.to_path_buf(),
            writer: Mutex::new(recovered.writer),
            published: RwLock::new(Arc::new(index)),
            reader: Arc::new(reader),
            last_txn_id: recovered.last_txn_id,
            recovery: recovered.stats,
        })
    }

    /// Durably append `entries` as one record and publish them.
    ///
    /// Entries are applied in order, so the last write to a key wins.
    pub fn commit(&self, txn_id: TxnId, entries: &[RecordEntry<'_>]) -> Result<CommitReceipt> {
        let encoded = encode_record(txn_id, entries)
            .map_err(|e| Error::commit(format!("cannot encode {}: {}", txn_id, e)))?;

        let mut writer = self.writer.lock();
        let offset = writer.end_offset();
        let locations = encoded.value_locations_at(offset);
        if locations.len() != entries.len() {
            return Err(Error::commit(format!(
                "{} encoded {} value locations for {} entries",
                txn_id,
                locations.len(),
                entries.len()
            )));
        }

        let written_at = writer
            .append(&encoded.bytes)
            .map_err(|e| Error::commit(format!("log append failed for {}: {}", txn_id, e)))?;
        debug_assert_eq!(written_at, offset);

        {
            let mut published = self.published.write();
            let index = Arc::make_mut(&mut *published);
            for (entry, location) in entries.iter().zip(locations) {
                index.apply(entry.kind, entry.key, location);
            }
        }

        trace!(
            target: "logdb::storage",
            txn = %txn_id,
            offset,
            "Published commit"
        );

        Ok(CommitReceipt {
            txn_id,
            offset,
            len: encoded.bytes.len() as u64,
            entries: entries.len(),
        })
    }

    /// Point-in-time view of the committed data
    pub fn snapshot(&self) -> IndexSnapshot {
        let index = Arc::clone(&*self.published.read());
        IndexSnapshot::new(index, Arc::clone(&self.reader))
    }

    /// Latest committed value for `key`
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let location = self.published.read().get(key);
        match location {
            Some(location) => Ok(Some(self.reader.read(location)?)),
            None => Ok(None),
        }
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.published.read().len()
    }

    /// True if no keys are live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush and fsync the log regardless of durability mode
    pub fn sync(&self) -> Result<()> {
        self.writer.lock().sync().map_err(Error::from)
    }

    /// Offset one past the last committed record
    pub fn log_len(&self) -> u64 {
        self.writer.lock().end_offset()
    }

    /// Highest transaction id found in the log at open
    pub fn last_recovered_txn_id(&self) -> Option<TxnId> {
        self.last_txn_id
    }

    /// What recovery found at open
    pub fn recovery_stats(&self) -> &RecoveryStats {
        &self.recovery
    }

    /// Cumulative writer counters
    pub fn counters(&self) -> LogCounters {
        self.writer.lock().counters()
    }

    /// Durability mode of the writer
    pub fn durability(&self) -> DurabilityMode {
        self.writer.lock().durability()
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make the next commit's append fail at `point`.
    #[cfg(feature = "fault-injection")]
    pub fn inject_failure(&self, point: FailPoint) {
        self.writer.lock().inject_failure(point);
    }
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("path", &self.path)
            .field("live_keys", &self.len())
            .finish()
    }
}
