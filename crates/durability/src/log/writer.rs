//! Log writer with durability mode support.
//!
//! Each commit record is appended with a single write at the current end of
//! the log. If the write or the fsync fails, the file is truncated back to
//! its previous end so a later append never lands after a partial record.

use super::DurabilityMode;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::time::Instant;
use tracing::{trace, warn};

/// Cumulative log operation counters.
///
/// These counters accumulate over the lifetime of the writer and are never
/// reset. Failed appends are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogCounters {
    /// Total commit records appended
    pub appends: u64,
    /// Total fsync calls
    pub sync_calls: u64,
    /// Total record bytes written
    pub bytes_written: u64,
    /// Total nanoseconds spent in fsync
    pub sync_nanos: u64,
}

/// One-shot failures injected into the next append.
#[cfg(feature = "fault-injection")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Write the first half of the record, then fail
    Write,
    /// Write the whole record, then fail the fsync
    Sync,
}

/// Appends commit records to an open log file.
pub struct LogWriter {
    file: File,
    /// Offset one past the last complete record
    end: u64,
    durability: DurabilityMode,
    counters: LogCounters,
    #[cfg(feature = "fault-injection")]
    fail_point: Option<FailPoint>,
}

impl LogWriter {
    /// Wrap `file`, whose valid contents end at `end`.
    pub fn new(file: File, end: u64, durability: DurabilityMode) -> Self {
        LogWriter {
            file,
            end,
            durability,
            counters: LogCounters::default(),
            #[cfg(feature = "fault-injection")]
            fail_point: None,
        }
    }

    /// Append one encoded record and make it durable per the durability mode.
    ///
    /// Returns the offset at which the record starts. On error the log is
    /// truncated back to its previous end, so the file holds no trace of the
    /// failed record.
    pub fn append(&mut self, record: &[u8]) -> io::Result<u64> {
        let start = self.end;

        if let Err(e) = self.write_and_sync(start, record) {
            if let Err(undo) = self.truncate_to(start) {
                warn!(
                    target: "logdb::log",
                    offset = start,
                    error = %undo,
                    "Failed to discard partial append"
                );
            }
            return Err(e);
        }

        self.end = start + record.len() as u64;
        self.counters.appends += 1;
        self.counters.bytes_written += record.len() as u64;
        Ok(start)
    }

    fn write_and_sync(&mut self, start: u64, record: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(start))?;

        #[cfg(feature = "fault-injection")]
        {
            if let Some(point) = self.fail_point.take() {
                return self.fail_at(point, record);
            }
        }

        self.file.write_all(record)?;
        if self.durability.requires_immediate_fsync() {
            self.sync_data()?;
        }
        Ok(())
    }

    #[cfg(feature = "fault-injection")]
    fn fail_at(&mut self, point: FailPoint, record: &[u8]) -> io::Result<()> {
        match point {
            FailPoint::Write => {
                self.file.write_all(&record[..record.len() / 2])?;
                Err(io::Error::new(io::ErrorKind::Other, "injected write failure"))
            }
            FailPoint::Sync => {
                self.file.write_all(record)?;
                Err(io::Error::new(io::ErrorKind::Other, "injected sync failure"))
            }
        }
    }

    fn sync_data(&mut self) -> io::Result<()> {
        let started = Instant::now();
        self.file.sync_data()?;
        self.counters.sync_calls += 1;
        self.counters.sync_nanos += started.elapsed().as_nanos() as u64;
        trace!(target: "logdb::log", end = self.end, "fsync");
        Ok(())
    }

    /// Flush everything written so far to stable storage, regardless of mode.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let started = Instant::now();
        self.file.sync_all()?;
        self.counters.sync_calls += 1;
        self.counters.sync_nanos += started.elapsed().as_nanos() as u64;
        trace!(target: "logdb::log", end = self.end, "fsync (full)");
        Ok(())
    }

    /// Cut the log back to `offset`, discarding everything after it.
    pub fn truncate_to(&mut self, offset: u64) -> io::Result<()> {
        self.file.set_len(offset)?;
        self.end = offset;
        Ok(())
    }

    /// Offset one past the last complete record
    pub fn end_offset(&self) -> u64 {
        self.end
    }

    /// Durability mode this writer was opened with
    pub fn durability(&self) -> DurabilityMode {
        self.durability
    }

    /// Snapshot of the cumulative counters
    pub fn counters(&self) -> LogCounters {
        self.counters
    }

    /// Make the next append fail at `point`.
    #[cfg(feature = "fault-injection")]
    pub fn inject_failure(&mut self, point: FailPoint) {
        self.fail_point = Some(point);
    }
}
