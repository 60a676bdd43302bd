//! Storage layer for LogDB
//!
//! This crate turns the durable log into a queryable store:
//! - KeyIndex: key → location of the latest committed value, or a tombstone,
//!   kept in first-commit order
//! - IndexSnapshot: immutable, `Arc`-shared view of the index plus a read
//!   handle for fetching values
//! - LogStore: owns the log writer and the published index; appends a commit
//!   record and publishes its writes as one step
//!
//! # Snapshots
//!
//! The published index lives behind `RwLock<Arc<KeyIndex>>`. Taking a
//! snapshot clones the `Arc`. A commit mutates the index through
//! `Arc::make_mut`, which copies the mapping only while a snapshot still
//! holds the old version. Values are never copied; they stay in the log.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod index;
pub mod snapshot;
pub mod store;

pub use index::{IndexEntry, KeyIndex};
pub use snapshot::IndexSnapshot;
pub use store::{CommitReceipt, LogStore};
