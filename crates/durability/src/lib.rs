//! Durability layer for LogDB
//!
//! This crate handles everything that touches disk:
//!
//! - Binary on-disk format: file header and one commit record per transaction
//! - Log writer: single-write appends, fsync per durability mode, rollback of
//!   partial appends
//! - Recovery: header validation, in-order replay, torn-tail truncation
//! - Positional value reads through a dedicated read handle

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod format; // Header and commit-record encoding
pub mod io; // Positional reads for committed values
pub mod log; // Writer, recovery scanner, durability modes
pub mod recovery; // Open-time validation and replay

pub use format::{
    decode_record, encode_record, DecodedEntry, DecodedRecord, EncodedRecord, FormatError,
    LogHeader, RecordEntry, LOG_FORMAT_VERSION, LOG_HEADER_SIZE, LOG_MAGIC,
};
pub use io::ValueReader;
#[cfg(feature = "fault-injection")]
pub use log::FailPoint;
pub use log::{
    DurabilityMode, LogCounters, LogReader, LogScan, LogWriter, ScanStopReason, ScannedRecord,
};
pub use recovery::{recover, RecoveredLog, RecoveryStats};
