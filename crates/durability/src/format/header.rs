//! Log file header
//!
//! Every log file starts with a fixed 16-byte header identifying the file and
//! its format version. Records follow immediately after.

use super::FormatError;

/// Magic bytes at the start of every log file
pub const LOG_MAGIC: [u8; 4] = *b"LOGD";

/// Current log format version
pub const LOG_FORMAT_VERSION: u32 = 1;

/// Size of the header in bytes
pub const LOG_HEADER_SIZE: usize = 16;

/// Log file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHeader {
    /// Magic bytes, always `LOGD`
    pub magic: [u8; 4],
    /// Format version
    pub format_version: u32,
}

impl LogHeader {
    /// Header for a new file in the current format
    pub fn new() -> Self {
        LogHeader {
            magic: LOG_MAGIC,
            format_version: LOG_FORMAT_VERSION,
        }
    }

    /// Serialize to bytes. The trailing 8 bytes are reserved and zeroed.
    pub fn to_bytes(&self) -> [u8; LOG_HEADER_SIZE] {
        let mut bytes = [0u8; LOG_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.format_version.to_le_bytes());
        bytes
    }

    /// Parse and validate a header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < LOG_HEADER_SIZE {
            return Err(FormatError::InsufficientData);
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != LOG_MAGIC {
            return Err(FormatError::BadMagic(magic));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..8]);
        let format_version = u32::from_le_bytes(version);
        if format_version != LOG_FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(format_version));
        }

        Ok(LogHeader {
            magic,
            format_version,
        })
    }

    /// True if `bytes` is a strict prefix of a freshly written header.
    ///
    /// A file shorter than the header is only recoverable when it was torn
    /// while the header itself was being written.
    pub fn is_torn_prefix(bytes: &[u8]) -> bool {
        bytes.len() < LOG_HEADER_SIZE && LogHeader::new().to_bytes()[..bytes.len()] == *bytes
    }
}

impl Default for LogHeader {
    fn default() -> Self {
        Self::new()
    }
}
