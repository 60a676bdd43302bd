//! Append-only log file: durability modes, writer and recovery scanner.

mod durability;
mod reader;
mod writer;

pub use durability::DurabilityMode;
pub use reader::{LogReader, LogScan, ScanStopReason, ScannedRecord};
#[cfg(feature = "fault-injection")]
pub use writer::FailPoint;
pub use writer::{LogCounters, LogWriter};
