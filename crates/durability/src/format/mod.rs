//! Binary on-disk format for the log file
//!
//! ```text
//! header (16 bytes): magic "LOGD" | format version u32 LE | reserved u64
//! commit record:     payload_len u32 LE | payload | crc32(payload) u32 LE
//! payload:           txn_id u64 | entry_count u32 | entries...
//! entry:             kind u8 | key_len u32 | value_len u32 | key | value
//! ```
//!
//! All integers are little-endian. A delete entry carries `value_len = 0`.

pub mod header;
pub mod record;

pub use header::{LogHeader, LOG_FORMAT_VERSION, LOG_HEADER_SIZE, LOG_MAGIC};
pub use record::{
    decode_record, encode_record, DecodedEntry, DecodedRecord, EncodedRecord, RecordEntry,
    RECORD_OVERHEAD,
};

/// Errors raised while decoding the log format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// Not enough bytes to hold a complete header or record (torn write)
    #[error("Insufficient data to parse record")]
    InsufficientData,

    /// Record CRC does not match its payload
    #[error("Checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the record
        expected: u32,
        /// Checksum computed over the payload
        computed: u32,
    },

    /// Header magic is not `LOGD`
    #[error("Invalid magic bytes: {0:02x?}")]
    BadMagic([u8; 4]),

    /// Header declares a format version this build cannot read
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u32),

    /// Entry kind byte is neither put nor delete
    #[error("Invalid entry kind: {0:#04x}")]
    InvalidKind(u8),

    /// Checksum passed but the payload does not parse
    #[error("Malformed record: {0}")]
    Malformed(String),

    /// Key or value too large for a u32 length field
    #[error("Entry too large: {0} bytes")]
    EntryTooLarge(usize),
}

impl From<FormatError> for logdb_core::Error {
    fn from(e: FormatError) -> Self {
        logdb_core::Error::corruption(e.to_string())
    }
}
