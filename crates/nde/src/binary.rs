//! Fixed wire layouts for the NDE table and index files.
//!
//! Two-file layout:
//! - `main.dat` — `NDETABLE` signature, then a pool of fields addressed by
//!   absolute byte offset
//! - `main.idx` — `NDEINDEX` signature, entry count, instance id, then one
//!   8-byte [`IndexEntry`] per record
//!
//! All multi-byte integers are little-endian and signed.

use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{FormatError, NdeError};

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// Signature at offset 0 of the table file.
pub const TABLE_SIGNATURE: &[u8; 8] = b"NDETABLE";

/// Signature at offset 0 of the index file.
pub const INDEX_SIGNATURE: &[u8; 8] = b"NDEINDEX";

/// Length of either signature.
pub const SIGNATURE_LEN: usize = 8;

/// Read the first [`SIGNATURE_LEN`] bytes of `reader` and compare them to `expected`.
///
/// A short or empty file is a mismatch, not an I/O error.
///
/// # Errors
///
/// Returns any non-EOF I/O error from `reader`.
pub fn signature_matches<R: Read>(
    reader: &mut R,
    expected: &[u8; SIGNATURE_LEN],
) -> io::Result<bool> {
    let mut buf = [0u8; SIGNATURE_LEN];
    match reader.read_exact(&mut buf) {
        Ok(()) => Ok(&buf == expected),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// FieldHeader: 14-byte header shared by every field
// ---------------------------------------------------------------------------

/// The common header at the start of every field.
///
/// Layout (14 bytes total):
/// ```text
/// [0]      id           u8
/// [1]      type tag     u8
/// [2..6]   max_size     i32 le  (declared payload capacity)
/// [6..10]  next_offset  i32 le  (<= 0 terminates the chain)
/// [10..14] prev_offset  i32 le  (informational)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldHeader {
    /// Role of the field within its record.
    pub id: u8,
    /// Raw wire type tag.
    pub tag: u8,
    /// Declared capacity of the payload in bytes.
    pub max_size: i32,
    /// Absolute offset of the next field in the chain, `<= 0` for none.
    pub next_offset: i32,
    /// Absolute offset of the previous field, `<= 0` for none.
    pub prev_offset: i32,
}

impl FieldHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 14;

    /// Decode a header from its 14 on-disk bytes.
    #[must_use]
    pub fn decode(buf: &[u8; Self::SIZE]) -> Self {
        let [id, tag, m0, m1, m2, m3, n0, n1, n2, n3, p0, p1, p2, p3] = *buf;
        Self {
            id,
            tag,
            max_size: i32::from_le_bytes([m0, m1, m2, m3]),
            next_offset: i32::from_le_bytes([n0, n1, n2, n3]),
            prev_offset: i32::from_le_bytes([p0, p1, p2, p3]),
        }
    }

    /// `true` when another field follows this one.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.next_offset > 0
    }
}

// ---------------------------------------------------------------------------
// IndexHeader / IndexEntry
// ---------------------------------------------------------------------------

/// Index header following the signature.
///
/// Layout (8 bytes, at file offset 8):
/// ```text
/// [0..4]  entries  i32 le
/// [4..8]  id       i32 le  (instance identifier, informational)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    /// Number of [`IndexEntry`] pairs that follow.
    pub entries: i32,
    /// Table instance identifier.
    pub id: i32,
}

impl IndexHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 8;

    /// Decode the header from its 8 on-disk bytes.
    #[must_use]
    pub fn decode(buf: &[u8; Self::SIZE]) -> Self {
        let [e0, e1, e2, e3, i0, i1, i2, i3] = *buf;
        Self {
            entries: i32::from_le_bytes([e0, e1, e2, e3]),
            id: i32::from_le_bytes([i0, i1, i2, i3]),
        }
    }
}

/// A single 8-byte entry in the index file.
///
/// Only `offset` is used; `reserved` is carried for completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Absolute offset of the record's first field in the table file.
    pub offset: i32,
    /// Second word of the pair; not interpreted.
    pub reserved: i32,
}

impl IndexEntry {
    /// Encoded size in bytes.
    pub const SIZE: usize = 8;

    /// Decode an entry from its 8 on-disk bytes.
    #[must_use]
    pub fn decode(buf: &[u8; Self::SIZE]) -> Self {
        let [o0, o1, o2, o3, r0, r1, r2, r3] = *buf;
        Self {
            offset: i32::from_le_bytes([o0, o1, o2, o3]),
            reserved: i32::from_le_bytes([r0, r1, r2, r3]),
        }
    }
}

// ---------------------------------------------------------------------------
// Stream helpers
// ---------------------------------------------------------------------------

/// Map a read failure at `offset` into an [`NdeError`].
///
/// Running out of bytes inside a declared structure is corruption
/// ([`FormatError::Truncated`]); anything else stays an I/O error.
pub(crate) fn truncated_at(offset: u64) -> impl FnOnce(io::Error) -> NdeError {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            NdeError::Format(FormatError::Truncated { offset })
        } else {
            NdeError::Io(e)
        }
    }
}

/// Read exactly `N` bytes at the current position, mapping EOF to `Truncated { offset }`.
pub(crate) fn read_array<R: Read, const N: usize>(
    reader: &mut R,
    offset: u64,
) -> Result<[u8; N], NdeError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(truncated_at(offset))?;
    Ok(buf)
}

/// Seek `reader` to the absolute `offset`.
pub(crate) fn seek_to<R: Seek>(reader: &mut R, offset: u64) -> Result<(), NdeError> {
    reader.seek(SeekFrom::Start(offset))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn field_header_decodes_little_endian() {
        let mut buf = [0u8; FieldHeader::SIZE];
        buf[0] = 7;
        buf[1] = 3;
        buf[2..6].copy_from_slice(&40i32.to_le_bytes());
        buf[6..10].copy_from_slice(&1234i32.to_le_bytes());
        buf[10..14].copy_from_slice(&(-1i32).to_le_bytes());
        let h = FieldHeader::decode(&buf);
        assert_eq!(h.id, 7);
        assert_eq!(h.tag, 3);
        assert_eq!(h.max_size, 40);
        assert_eq!(h.next_offset, 1234);
        assert_eq!(h.prev_offset, -1);
        assert!(h.has_next());
    }

    #[test]
    fn field_header_zero_next_terminates() {
        let h = FieldHeader::decode(&[0u8; FieldHeader::SIZE]);
        assert!(!h.has_next());
    }

    #[test]
    fn index_entry_keeps_offset_and_reserved() {
        let mut buf = [0u8; IndexEntry::SIZE];
        buf[0..4].copy_from_slice(&0x0001_0000i32.to_le_bytes());
        buf[4..8].copy_from_slice(&3i32.to_le_bytes());
        let e = IndexEntry::decode(&buf);
        assert_eq!(e.offset, 0x0001_0000);
        assert_eq!(e.reserved, 3);
    }

    #[test]
    fn signature_accepts_exact_match() {
        let mut cur = Cursor::new(b"NDETABLE and more".to_vec());
        assert!(signature_matches(&mut cur, TABLE_SIGNATURE).unwrap());
    }

    #[test]
    fn signature_rejects_empty_and_short_input() {
        let empty = signature_matches(&mut Cursor::new(Vec::new()), TABLE_SIGNATURE);
        assert!(!empty.unwrap());
        let short = signature_matches(&mut Cursor::new(b"NDETA".to_vec()), TABLE_SIGNATURE);
        assert!(!short.unwrap());
    }

    #[test]
    fn signature_rejects_other_file_kind() {
        let mut cur = Cursor::new(INDEX_SIGNATURE.to_vec());
        assert!(!signature_matches(&mut cur, TABLE_SIGNATURE).unwrap());
    }

    #[test]
    fn read_array_reports_truncation_offset() {
        let mut cur = Cursor::new(vec![1u8, 2, 3]);
        let err = read_array::<_, 8>(&mut cur, 42).unwrap_err();
        assert!(matches!(
            err,
            NdeError::Format(FormatError::Truncated { offset: 42 })
        ));
    }
}
