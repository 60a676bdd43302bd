//! Error types for LogDB
//!
//! This module defines the error taxonomy shared by every layer of the store.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Misuse errors (`UseAfterFree`, `InvalidIteratorState`, `ObjectDisposed`,
//! `TransactionAlreadyActive`, `NoActiveTransaction`) are programmer errors and
//! are never retried. Double release and double close are no-ops, not errors.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for LogDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the LogDB store
#[derive(Debug, Error)]
pub enum Error {
    /// The log could not be opened: bad path, permissions, lock contention,
    /// or an incompatible/corrupt file.
    #[error("Failed to open '{}': {reason}", path.display())]
    Open {
        /// Path passed to open
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// `begin` was called while a transaction is already active
    #[error("A transaction is already active on this connection")]
    TransactionAlreadyActive,

    /// `put`, `delete`, `commit` or `rollback` was called with no active transaction
    #[error("No active transaction")]
    NoActiveTransaction,

    /// The durable append of a commit failed; nothing from the transaction is visible
    #[error("Commit failed: {0}")]
    Commit(String),

    /// Memory could not be reserved for a buffer
    #[error("Allocation of {requested} bytes failed")]
    Allocation {
        /// Number of bytes that could not be reserved
        requested: usize,
    },

    /// A buffer was accessed after it was released
    #[error("Buffer used after release")]
    UseAfterFree,

    /// `current_key`/`current_value` before the first advance or after exhaustion
    #[error("Iterator is not positioned on an entry")]
    InvalidIteratorState,

    /// An operation was attempted on a released handle
    #[error("{0} has been disposed")]
    ObjectDisposed(&'static str),

    /// Reading an entry during iteration failed
    #[error("Iteration error: {0}")]
    Iteration(String),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Data corruption detected
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Create an `Open` error for `path`
    pub fn open(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Error::Open {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a `Commit` error
    pub fn commit(message: impl Into<String>) -> Self {
        Error::Commit(message.into())
    }

    /// Create a `Corruption` error
    pub fn corruption(message: impl Into<String>) -> Self {
        Error::Corruption(message.into())
    }

    /// Create an `Iteration` error
    pub fn iteration(message: impl Into<String>) -> Self {
        Error::Iteration(message.into())
    }

    /// Returns true for errors caused by misusing the API rather than by
    /// the environment. These are never transient.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            Error::TransactionAlreadyActive
                | Error::NoActiveTransaction
                | Error::UseAfterFree
                | Error::InvalidIteratorState
                | Error::ObjectDisposed(_)
        )
    }
}
