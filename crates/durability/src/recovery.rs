//! Open-time recovery of a log file.
//!
//! Recovery is the only reader of the whole log. It:
//! 1. writes a header into an empty file (or one torn while its header was
//!    being written);
//! 2. rejects files whose header is not a LogDB header;
//! 3. scans records in append order, stopping at the first one that is torn
//!    or fails its checksum;
//! 4. truncates the file at that point so later appends start on a record
//!    boundary.
//!
//! The caller replays the returned records into its index.

use crate::format::{LogHeader, LOG_HEADER_SIZE};
use crate::log::{DurabilityMode, LogReader, LogWriter, ScanStopReason, ScannedRecord};
use logdb_core::{Error, Result, TxnId};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{info, warn};

/// What recovery found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Complete records found
    pub records_replayed: usize,
    /// Entries across those records
    pub entries_replayed: usize,
    /// Bytes discarded from the tail
    pub bytes_truncated: u64,
    /// True if a fresh header was written
    pub header_written: bool,
}

/// A recovered log, ready for appends.
pub struct RecoveredLog {
    /// Writer positioned at the end of the last valid record
    pub writer: LogWriter,
    /// Valid records in append order
    pub records: Vec<ScannedRecord>,
    /// Highest transaction id in the log
    pub last_txn_id: Option<TxnId>,
    /// Summary of the recovery
    pub stats: RecoveryStats,
}

/// Validate, scan and repair the log in `file`.
///
/// `file` must be open for reading and writing. `path` is only used in
/// errors and log events. A header that is neither valid nor a torn prefix
/// of a valid one fails with `Error::Open`.
pub fn recover(mut file: File, path: &Path, durability: DurabilityMode) -> Result<RecoveredLog> {
    let len = file.metadata()?.len();
    let mut stats = RecoveryStats::default();

    if len < LOG_HEADER_SIZE as u64 {
        let mut existing = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut existing)?;
        if !LogHeader::is_torn_prefix(&existing) {
            return Err(Error::open(
                path,
                format!("not a log file ({} bytes, bad header)", len),
            ));
        }
        if len > 0 {
            warn!(
                target: "logdb::recovery",
                path = %path.display(),
                len,
                "Rewriting torn log header"
            );
        }
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&LogHeader::new().to_bytes())?;
        file.sync_all()?;
        stats.header_written = true;
    } else {
        let mut bytes = [0u8; LOG_HEADER_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut bytes)?;
        LogHeader::from_bytes(&bytes)
            .map_err(|e| Error::open(path, format!("not a log file: {}", e)))?;
    }

    let scan = LogReader::scan(&mut file)?;
    let last_txn_id = scan.max_txn_id();
    let tail = scan.tail_len();
    let mut writer = LogWriter::new(file, scan.valid_end, durability);

    if tail > 0 {
        let reason = match &scan.stop_reason {
            ScanStopReason::PartialRecord { .. } => "torn record".to_string(),
            ScanStopReason::ChecksumMismatch { .. } => "checksum mismatch".to_string(),
            ScanStopReason::Malformed { detail, .. } => detail.clone(),
            ScanStopReason::EndOfData => "trailing bytes".to_string(),
        };
        warn!(
            target: "logdb::recovery",
            path = %path.display(),
            valid_end = scan.valid_end,
            discarded = tail,
            reason = %reason,
            "Truncating log tail"
        );
        writer.truncate_to(scan.valid_end)?;
        writer.sync()?;
        stats.bytes_truncated = tail;
    }

    stats.records_replayed = scan.records.len();
    stats.entries_replayed = scan.records.iter().map(|r| r.record.entries.len()).sum();

    info!(
        target: "logdb::recovery",
        path = %path.display(),
        records = stats.records_replayed,
        entries = stats.entries_replayed,
        bytes_truncated = stats.bytes_truncated,
        "Recovery complete"
    );

    Ok(RecoveredLog {
        writer,
        records: scan.records,
        last_txn_id,
        stats,
    })
}
