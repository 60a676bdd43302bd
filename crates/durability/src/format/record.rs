//! Commit record encoding
//!
//! One record per committed transaction. The record is self-delimiting: a
//! length prefix, the payload, then a CRC32 of the payload. A record is only
//! trusted once the checksum matches, so a crash mid-append leaves a tail that
//! fails to decode and is discarded at recovery.

use super::FormatError;
use byteorder::{ByteOrder, LittleEndian};
use logdb_core::{RecordLocation, TxnId, WriteKind};

/// Size of the length prefix
const LEN_PREFIX_SIZE: usize = 4;
/// txn_id u64 + entry_count u32
const PAYLOAD_HEADER_SIZE: usize = 12;
/// kind u8 + key_len u32 + value_len u32
const ENTRY_HEADER_SIZE: usize = 9;
/// Size of the trailing CRC
const CRC_SIZE: usize = 4;

/// Bytes a record occupies beyond its entries
pub const RECORD_OVERHEAD: usize = LEN_PREFIX_SIZE + PAYLOAD_HEADER_SIZE + CRC_SIZE;

/// One write to encode into a commit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordEntry<'a> {
    /// Put or delete
    pub kind: WriteKind,
    /// Key bytes
    pub key: &'a [u8],
    /// Value bytes (empty for a delete)
    pub value: &'a [u8],
}

impl<'a> RecordEntry<'a> {
    /// A put of `key` → `value`
    pub fn put(key: &'a [u8], value: &'a [u8]) -> Self {
        RecordEntry {
            kind: WriteKind::Put,
            key,
            value,
        }
    }

    /// A tombstone for `key`
    pub fn delete(key: &'a [u8]) -> Self {
        RecordEntry {
            kind: WriteKind::Delete,
            key,
            value: &[],
        }
    }

    fn encoded_len(&self) -> usize {
        ENTRY_HEADER_SIZE + self.key.len() + self.value.len()
    }
}

/// A fully encoded commit record, ready for a single append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    /// Record bytes, length prefix through CRC
    pub bytes: Vec<u8>,
    /// Location of each entry's value, relative to the start of the record
    pub value_locations: Vec<RecordLocation>,
}

impl EncodedRecord {
    /// Absolute value locations, in entry order, once the record is
    /// written at `base`.
    pub fn value_locations_at(&self, base: u64) -> Vec<RecordLocation> {
        self.value_locations
            .iter()
            .map(|loc| RecordLocation::new(base + loc.offset, loc.len))
            .collect()
    }
}

/// A decoded entry. Values are not copied out; only their location is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEntry {
    /// Put or delete
    pub kind: WriteKind,
    /// Key bytes
    pub key: Vec<u8>,
    /// Value location relative to the start of the record
    pub value: RecordLocation,
}

/// A decoded commit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    /// Transaction that produced this record
    pub txn_id: TxnId,
    /// Entries in staging order
    pub entries: Vec<DecodedEntry>,
}

fn checked_u32(len: usize) -> Result<u32, FormatError> {
    u32::try_from(len).map_err(|_| FormatError::EntryTooLarge(len))
}

/// Encode a commit record.
///
/// Fails with `EntryTooLarge` if any length, or the payload as a whole, does
/// not fit the u32 length fields.
pub fn encode_record(
    txn_id: TxnId,
    entries: &[RecordEntry<'_>],
) -> Result<EncodedRecord, FormatError> {
    let mut payload_len = PAYLOAD_HEADER_SIZE;
    for entry in entries {
        checked_u32(entry.key.len())?;
        checked_u32(entry.value.len())?;
        payload_len = payload_len
            .checked_add(entry.encoded_len())
            .ok_or(FormatError::EntryTooLarge(usize::MAX))?;
    }
    let payload_len_u32 = checked_u32(payload_len)?;
    let entry_count = checked_u32(entries.len())?;

    let mut bytes = vec![0u8; LEN_PREFIX_SIZE + payload_len + CRC_SIZE];
    LittleEndian::write_u32(&mut bytes[0..4], payload_len_u32);
    LittleEndian::write_u64(&mut bytes[4..12], txn_id.as_u64());
    LittleEndian::write_u32(&mut bytes[12..16], entry_count);

    let mut pos = LEN_PREFIX_SIZE + PAYLOAD_HEADER_SIZE;
    let mut value_locations = Vec::with_capacity(entries.len());
    for entry in entries {
        bytes[pos] = entry.kind.as_byte();
        LittleEndian::write_u32(&mut bytes[pos + 1..pos + 5], entry.key.len() as u32);
        LittleEndian::write_u32(&mut bytes[pos + 5..pos + 9], entry.value.len() as u32);
        pos += ENTRY_HEADER_SIZE;

        bytes[pos..pos + entry.key.len()].copy_from_slice(entry.key);
        pos += entry.key.len();

        value_locations.push(RecordLocation::new(pos as u64, entry.value.len() as u32));
        bytes[pos..pos + entry.value.len()].copy_from_slice(entry.value);
        pos += entry.value.len();
    }

    let crc = crc32fast::hash(&bytes[LEN_PREFIX_SIZE..pos]);
    LittleEndian::write_u32(&mut bytes[pos..pos + CRC_SIZE], crc);

    Ok(EncodedRecord {
        bytes,
        value_locations,
    })
}

/// Decode one record from the front of `bytes`.
///
/// Returns the record and the number of bytes it occupies. A record cut short
/// by the end of `bytes` yields `InsufficientData`; a record whose checksum
/// does not match yields `ChecksumMismatch`.
pub fn decode_record(bytes: &[u8]) -> Result<(DecodedRecord, usize), FormatError> {
    if bytes.len() < LEN_PREFIX_SIZE {
        return Err(FormatError::InsufficientData);
    }

    let payload_len = LittleEndian::read_u32(&bytes[0..4]) as usize;
    let total = LEN_PREFIX_SIZE + payload_len + CRC_SIZE;
    if bytes.len() < total {
        return Err(FormatError::InsufficientData);
    }

    let payload_end = LEN_PREFIX_SIZE + payload_len;
    let payload = &bytes[LEN_PREFIX_SIZE..payload_end];
    let stored_crc = LittleEndian::read_u32(&bytes[payload_end..total]);
    let computed_crc = crc32fast::hash(payload);
    if stored_crc != computed_crc {
        return Err(FormatError::ChecksumMismatch {
            expected: stored_crc,
            computed: computed_crc,
        });
    }

    if payload_len < PAYLOAD_HEADER_SIZE {
        return Err(FormatError::Malformed(format!(
            "payload of {} bytes is shorter than its header",
            payload_len
        )));
    }

    let txn_id = TxnId(LittleEndian::read_u64(&bytes[4..12]));
    let entry_count = LittleEndian::read_u32(&bytes[12..16]) as usize;

    // Cap the preallocation; entry_count is only trusted as far as the bytes go.
    let mut entries = Vec::with_capacity(entry_count.min(payload_len / ENTRY_HEADER_SIZE));
    let mut pos = LEN_PREFIX_SIZE + PAYLOAD_HEADER_SIZE;
    for i in 0..entry_count {
        if payload_end - pos < ENTRY_HEADER_SIZE {
            return Err(FormatError::Malformed(format!(
                "entry {} header runs past the payload",
                i
            )));
        }
        let kind_byte = bytes[pos];
        let kind = WriteKind::from_byte(kind_byte).ok_or(FormatError::InvalidKind(kind_byte))?;
        let key_len = LittleEndian::read_u32(&bytes[pos + 1..pos + 5]) as usize;
        let value_len = LittleEndian::read_u32(&bytes[pos + 5..pos + 9]);
        pos += ENTRY_HEADER_SIZE;

        if payload_end - pos < key_len + value_len as usize {
            return Err(FormatError::Malformed(format!(
                "entry {} body runs past the payload",
                i
            )));
        }
        if kind == WriteKind::Delete && value_len != 0 {
            return Err(FormatError::Malformed(format!(
                "delete entry {} carries a value",
                i
            )));
        }

        let key = bytes[pos..pos + key_len].to_vec();
        pos += key_len;
        let value = RecordLocation::new(pos as u64, value_len);
        pos += value_len as usize;

        entries.push(DecodedEntry { kind, key, value });
    }

    if pos != payload_end {
        return Err(FormatError::Malformed(format!(
            "{} trailing bytes after {} entries",
            payload_end - pos,
            entry_count
        )));
    }

    Ok((DecodedRecord { txn_id, entries }, total))
}
