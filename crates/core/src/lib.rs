//! Core types for LogDB
//!
//! This crate defines the foundational types used throughout the store:
//! - Buffer: reference-counted byte span used for keys and values
//! - Error: error taxonomy shared by every layer
//! - TxnId, WriteKind, RecordLocation: identifiers passed between layers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod error;
pub mod types;

pub use buffer::Buffer;
pub use error::{Error, Result};
pub use types::{RecordLocation, TxnId, WriteKind};
