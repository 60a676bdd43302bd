//! Engine layer for LogDB
//!
//! This crate ties the lower layers together behind the public handles:
//! - Connection: open/close lifecycle, file locking, transaction API
//! - SnapshotIterator: cursor over a point-in-time view of committed data
//! - OpenOptions / LogDbConfig: open flags and their TOML form
//!
//! A `Connection` owns one log file exclusively. It is `Send + Sync`; its
//! state sits behind a `parking_lot` mutex so calls from different threads
//! are serialized. Iterators hold their own snapshot and read handle and
//! never block the connection.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod iterator;
pub mod options;

pub use connection::Connection;
pub use iterator::SnapshotIterator;
pub use options::{LogDbConfig, OpenMode, OpenOptions, CONFIG_FILE_NAME};

pub use logdb_core::{Buffer, Error, Result, TxnId};
#[cfg(feature = "fault-injection")]
pub use logdb_durability::FailPoint;
pub use logdb_durability::{DurabilityMode, LogCounters, RecoveryStats};
