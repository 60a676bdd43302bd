//! Transaction layer for LogDB
//!
//! This crate implements single-writer transactions over a `LogStore`:
//! - TransactionContext: staged writes and the Active → Committed/Aborted
//!   state machine
//! - TransactionManager: id allocation and the commit protocol
//!
//! There is no conflict detection; a connection runs at most one write
//! transaction at a time, and readers work from immutable snapshots.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;

pub use manager::{CommitOutcome, TransactionManager};
pub use transaction::{PendingOperations, StagedWrite, TransactionContext, TransactionStatus};
