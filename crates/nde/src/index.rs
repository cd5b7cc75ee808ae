//! Index — record start offsets loaded from the `.idx` file.
//!
//! Logical positions are 0-based. Position 0 is the column record that
//! defines the schema, position 1 is reserved, data rows start at 2.

use std::fs;
use std::io::{BufReader, Read};
use std::ops::Range;
use std::path::Path;

use crate::binary::{
    read_array, signature_matches, IndexEntry, IndexHeader, INDEX_SIGNATURE, SIGNATURE_LEN,
};
use crate::error::{FormatError, NdeError, Result};

/// Position of the column (schema) record.
pub const COLUMN_POSITION: usize = 0;

/// Reserved position; never yielded as a data row.
pub const RESERVED_POSITION: usize = 1;

/// First position holding a data row.
pub const FIRST_DATA_POSITION: usize = 2;

/// Upper bound on entries reserved up front; a corrupt count must not
/// allocate before the entries are actually read.
const MAX_PREALLOC: usize = 64 * 1024;

/// In-memory copy of an NDE index file. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    entries: Vec<IndexEntry>,
    id: i32,
}

impl Index {
    /// Load the index stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns `NdeError::Io` if the file cannot be opened, otherwise as
    /// [`Index::from_reader`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path)?;
        let index = Self::from_reader(BufReader::new(file))?;
        tracing::debug!(
            path = %path.display(),
            entries = index.len(),
            id = index.id,
            "loaded index"
        );
        Ok(index)
    }

    /// Read a complete index from `reader`, starting at its signature.
    ///
    /// # Errors
    ///
    /// - [`FormatError::NotAnIndex`] if the `NDEINDEX` signature is absent
    /// - [`FormatError::NegativeEntryCount`] if the header count is negative
    /// - [`FormatError::Truncated`] if fewer entries follow than declared
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        if !signature_matches(&mut reader, INDEX_SIGNATURE)? {
            return Err(FormatError::NotAnIndex.into());
        }

        let mut pos = SIGNATURE_LEN as u64;
        let header = IndexHeader::decode(&read_array(&mut reader, pos)?);
        let count = usize::try_from(header.entries)
            .map_err(|_| FormatError::NegativeEntryCount(header.entries))?;
        pos = pos.saturating_add(IndexHeader::SIZE as u64);

        let mut entries = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            entries.push(IndexEntry::decode(&read_array(&mut reader, pos)?));
            pos = pos.saturating_add(IndexEntry::SIZE as u64);
        }

        Ok(Self {
            entries,
            id: header.id,
        })
    }

    /// Record start offset stored at logical `position`.
    ///
    /// # Errors
    ///
    /// Returns `NdeError::OutOfRange` if `position >= self.len()`.
    pub fn offset(&self, position: usize) -> Result<i32> {
        self.entries
            .get(position)
            .map(|e| e.offset)
            .ok_or(NdeError::OutOfRange {
                position,
                len: self.entries.len(),
            })
    }

    /// Number of entries, reserved positions included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the index holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of data rows (entries minus the two reserved positions).
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.entries.len().saturating_sub(FIRST_DATA_POSITION)
    }

    /// Logical positions of the data rows, in index order.
    #[must_use]
    pub fn data_positions(&self) -> Range<usize> {
        FIRST_DATA_POSITION..self.entries.len().max(FIRST_DATA_POSITION)
    }

    /// Table instance id from the index header.
    #[must_use]
    pub fn id(&self) -> i32 {
        self.id
    }

    /// All raw entries, by logical position.
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use nde_testing::{FixtureField, LibraryFixture};
    use std::io::Cursor;

    fn five_entry_index() -> (Vec<u8>, Vec<i32>) {
        let fixture = LibraryFixture::new()
            .column(1, "title")
            .row(vec![FixtureField::string(1, "a")])
            .row(vec![FixtureField::string(1, "b")])
            .row(vec![FixtureField::string(1, "c")])
            .index_id(77)
            .build();
        (fixture.index, fixture.record_offsets)
    }

    #[test]
    fn loads_header_and_entries() {
        let (bytes, offsets) = five_entry_index();
        let index = Index::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(index.id(), 77);
        assert_eq!(index.record_count(), 3);
        for (pos, expected) in offsets.iter().enumerate() {
            assert_eq!(index.offset(pos).unwrap(), *expected);
        }
    }

    #[test]
    fn reserved_positions_precede_data_rows() {
        let (bytes, _) = five_entry_index();
        let index = Index::from_reader(Cursor::new(bytes)).unwrap();
        assert!(index.offset(COLUMN_POSITION).unwrap() > 0);
        assert_eq!(index.offset(RESERVED_POSITION).unwrap(), 0);
        assert_eq!(index.data_positions(), 2..5);
    }

    #[test]
    fn out_of_range_position_is_rejected() {
        let (bytes, _) = five_entry_index();
        let index = Index::from_reader(Cursor::new(bytes)).unwrap();
        let Err(NdeError::OutOfRange { position, len }) = index.offset(5) else {
            panic!("expected an out-of-range error");
        };
        assert_eq!((position, len), (5, 5));
        assert!(index.offset(usize::MAX).is_err());
    }

    #[test]
    fn missing_signature_is_not_an_index() {
        let mut bytes = five_entry_index().0;
        bytes[0] = b'X';
        let err = Index::from_reader(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, NdeError::Format(FormatError::NotAnIndex)));
    }

    #[test]
    fn table_file_is_not_an_index() {
        let bytes = b"NDETABLE\0\0\0\0".to_vec();
        let err = Index::from_reader(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, NdeError::Format(FormatError::NotAnIndex)));
    }

    #[test]
    fn empty_file_is_not_an_index() {
        let err = Index::from_reader(Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, NdeError::Format(FormatError::NotAnIndex)));
    }

    #[test]
    fn negative_entry_count_is_rejected() {
        let mut bytes = INDEX_SIGNATURE.to_vec();
        bytes.extend_from_slice(&(-3i32).to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes());
        let err = Index::from_reader(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            err,
            NdeError::Format(FormatError::NegativeEntryCount(-3))
        ));
    }

    #[test]
    fn fewer_entries_than_declared_is_truncated() {
        let (mut bytes, _) = five_entry_index();
        bytes.truncate(bytes.len() - 4);
        let err = Index::from_reader(Cursor::new(bytes)).unwrap_err();
        // last entry starts at 16 + 4 * 8
        assert!(matches!(
            err,
            NdeError::Format(FormatError::Truncated { offset: 48 })
        ));
    }

    #[test]
    fn huge_declared_count_fails_without_preallocating() {
        let mut bytes = INDEX_SIGNATURE.to_vec();
        bytes.extend_from_slice(&i32::MAX.to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes());
        let err = Index::from_reader(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            err,
            NdeError::Format(FormatError::Truncated { offset: 16 })
        ));
    }

    #[test]
    fn index_with_only_reserved_entries_has_no_rows() {
        let bytes = LibraryFixture::new().build().index;
        let index = Index::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.record_count(), 0);
        assert!(index.data_positions().is_empty());
    }

    #[test]
    fn load_reads_from_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fixture = LibraryFixture::new().column(1, "title").build();
        let (_, idx) = fixture.write_to(tmp.path(), "main").unwrap();
        let index = Index::load(&idx).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = Index::load(tmp.path().join("missing.idx")).unwrap_err();
        assert!(matches!(err, NdeError::Io(_)));
    }
}
