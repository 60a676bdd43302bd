//! Log scanner for recovery.
//!
//! Reads every record after the header, in append order, stopping at the
//! first record that is incomplete or fails to decode. Everything before that
//! point is the valid log; everything after it is a tail to discard.

use crate::format::{decode_record, DecodedRecord, FormatError, LOG_HEADER_SIZE};
use logdb_core::TxnId;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

/// A record found by the scanner, with its position in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedRecord {
    /// Absolute file offset of the record's first byte
    pub offset: u64,
    /// The decoded record; value locations are relative to `offset`
    pub record: DecodedRecord,
}

/// Why the scan stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStopReason {
    /// Every byte after the header belonged to a complete record
    EndOfData,
    /// The last record was cut short (crash during append)
    PartialRecord {
        /// File offset of the incomplete record
        offset: u64,
    },
    /// A record's checksum did not match its payload
    ChecksumMismatch {
        /// File offset of the bad record
        offset: u64,
    },
    /// The checksum matched but the payload did not parse
    Malformed {
        /// File offset of the bad record
        offset: u64,
        /// Decoder message
        detail: String,
    },
}

/// Result of scanning a log file.
#[derive(Debug, Clone)]
pub struct LogScan {
    /// Valid records in append order
    pub records: Vec<ScannedRecord>,
    /// Offset one past the last valid record
    pub valid_end: u64,
    /// File length at the time of the scan
    pub file_len: u64,
    /// Why the scan stopped
    pub stop_reason: ScanStopReason,
}

impl LogScan {
    /// Highest transaction id among the valid records
    pub fn max_txn_id(&self) -> Option<TxnId> {
        self.records.iter().map(|r| r.record.txn_id).max()
    }

    /// Bytes past the last valid record
    pub fn tail_len(&self) -> u64 {
        self.file_len.saturating_sub(self.valid_end)
    }
}

/// Reads commit records from a log file.
pub struct LogReader;

impl LogReader {
    /// Scan all records after the header.
    ///
    /// The header itself is not validated here.
    pub fn scan(file: &mut File) -> io::Result<LogScan> {
        let file_len = file.metadata()?.len();
        let header_end = LOG_HEADER_SIZE as u64;

        let mut buffer = Vec::new();
        file.seek(SeekFrom::Start(header_end))?;
        file.read_to_end(&mut buffer)?;

        let mut records = Vec::new();
        let mut consumed = 0usize;
        let mut stop_reason = ScanStopReason::EndOfData;

        while consumed < buffer.len() {
            let offset = header_end + consumed as u64;
            match decode_record(&buffer[consumed..]) {
                Ok((record, len)) => {
                    records.push(ScannedRecord { offset, record });
                    consumed += len;
                }
                Err(FormatError::InsufficientData) => {
                    stop_reason = ScanStopReason::PartialRecord { offset };
                    break;
                }
                Err(FormatError::ChecksumMismatch { .. }) => {
                    stop_reason = ScanStopReason::ChecksumMismatch { offset };
                    break;
                }
                Err(e) => {
                    stop_reason = ScanStopReason::Malformed {
                        offset,
                        detail: e.to_string(),
                    };
                    break;
                }
            }
        }

        Ok(LogScan {
            records,
            valid_end: header_end + consumed as u64,
            file_len,
            stop_reason,
        })
    }
}
