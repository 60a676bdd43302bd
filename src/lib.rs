//! LogDB - embedded, durable, single-writer key-value log store
//!
//! Data lives in one append-only log file. Each committed transaction is one
//! checksummed record; an in-memory index maps each key to its latest value
//! in the log. Reads go through immutable snapshots, so iteration never
//! blocks the writer and never sees commits made after it started.
//!
//! # Quick Start
//!
//! ```no_run
//! use logdb::{Buffer, Connection, OpenMode};
//!
//! # fn main() -> logdb::Result<()> {
//! let conn = Connection::open("app.log", OpenMode::Create)?;
//!
//! conn.begin_transaction()?;
//! conn.put(&Buffer::from("user:1"), &Buffer::from("alice"))?;
//! conn.put(&Buffer::from("user:2"), &Buffer::from("bob"))?;
//! conn.commit_transaction()?;
//!
//! let mut it = conn.iterate_all()?;
//! while it.advance()? {
//!     let key = it.current_key()?;
//!     let value = it.current_value()?;
//!     println!("{:?} = {:?}", key, value);
//! }
//!
//! conn.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! | Crate | Role |
//! |-------|------|
//! | `logdb-core` | `Buffer`, errors, shared ids |
//! | `logdb-durability` | file format, writer, recovery |
//! | `logdb-storage` | index, snapshots, `LogStore` |
//! | `logdb-concurrency` | transactions and the commit protocol |
//! | `logdb-engine` | `Connection`, `SnapshotIterator`, options |
//!
//! Only the engine API and the core types are re-exported here.

pub use logdb_core::{Buffer, Error, Result, TxnId};
#[cfg(feature = "fault-injection")]
pub use logdb_engine::FailPoint;
pub use logdb_engine::{
    Connection, DurabilityMode, LogCounters, LogDbConfig, OpenMode, OpenOptions, RecoveryStats,
    SnapshotIterator, CONFIG_FILE_NAME,
};
