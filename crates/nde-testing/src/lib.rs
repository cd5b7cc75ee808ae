//! Fixture builder for NDE (Winamp media library) byte images.
//!
//! Produces a `.dat` table image and its matching `.idx` index image from a
//! declarative description of the column record and the data rows. Fields can
//! be built well-formed ([`FixtureField::string`], [`FixtureField::integer`],
//! ...) or raw ([`FixtureField::raw`]) so tests can exercise corrupt input:
//! unknown tags, bad integer widths, truncated payloads, runaway chains.
//!
//! # Quick start
//!
//! ```
//! use nde_testing::{FixtureField, LibraryFixture};
//!
//! let fixture = LibraryFixture::new()
//!     .columns(&[(1, "title"), (2, "artist")])
//!     .row(vec![
//!         FixtureField::string(1, "So What"),
//!         FixtureField::string(2, "Miles Davis"),
//!     ])
//!     .build();
//!
//! assert!(fixture.table.starts_with(b"NDETABLE"));
//! assert!(fixture.index.starts_with(b"NDEINDEX"));
//! ```
//!
//! # Layout written
//!
//! ```text
//! table:  "NDETABLE" | record 0 (columns) | record 2 | record 3 | ...
//! index:  "NDEINDEX" | entries i32 | id i32 | (offset i32, position i32) × entries
//! ```
//!
//! Index position 1 is always written with offset 0 (an empty record).

// Test tooling: offsets are bounded by the size of in-memory fixtures.
#![allow(
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Signature at offset 0 of every table file.
pub const TABLE_SIGNATURE: &[u8; 8] = b"NDETABLE";
/// Signature at offset 0 of every index file.
pub const INDEX_SIGNATURE: &[u8; 8] = b"NDEINDEX";
/// Bytes in the common field header (id, tag, max size, next, prev).
pub const FIELD_HEADER_LEN: usize = 14;

/// Wire type tags.
pub mod tag {
    /// Column definition.
    pub const COLUMN: u8 = 0;
    /// Index definition (redirection); not decodable by the reader.
    pub const INDEX: u8 = 1;
    /// UTF-16 string.
    pub const STRING: u8 = 3;
    /// 32-bit integer.
    pub const INTEGER: u8 = 4;
    /// Seconds since the Unix epoch.
    pub const DATETIME: u8 = 10;
    /// Integer-encoded length.
    pub const LENGTH: u8 = 11;
    /// UTF-16 filename.
    pub const FILENAME: u8 = 12;
}

/// Where a field's `next` pointer leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// The following field in the same record, or 0 for the last one.
    Chain,
    /// An explicit absolute offset.
    Absolute(i32),
    /// The first field of the record this field belongs to (a cycle).
    RecordStart,
}

/// One field of a fixture record.
#[derive(Debug, Clone)]
pub struct FixtureField {
    /// Field id within the record.
    pub id: u8,
    /// Wire type tag.
    pub tag: u8,
    /// Declared payload capacity.
    pub max_size: i32,
    /// Payload bytes written after the 14-byte header.
    pub payload: Vec<u8>,
    /// Chain pointer policy.
    pub next: Next,
}

impl FixtureField {
    /// A raw field with arbitrary tag, declared size and payload.
    pub fn raw(id: u8, tag: u8, max_size: i32, payload: Vec<u8>) -> Self {
        Self {
            id,
            tag,
            max_size,
            payload,
            next: Next::Chain,
        }
    }

    /// A column definition naming logical field `name`, declared as a string column.
    pub fn column(id: u8, name: &str) -> Self {
        Self::column_typed(id, name, tag::STRING)
    }

    /// A column definition with an explicit declared column type.
    pub fn column_typed(id: u8, name: &str, column_type: u8) -> Self {
        let mut payload = vec![column_type, 0, name.len() as u8];
        payload.extend_from_slice(name.as_bytes());
        let max_size = payload.len() as i32;
        Self::raw(id, tag::COLUMN, max_size, payload)
    }

    /// A UTF-16LE string field with a leading byte-order mark.
    pub fn string(id: u8, text: &str) -> Self {
        Self::utf16(id, tag::STRING, text)
    }

    /// A filename field; encoded exactly like [`FixtureField::string`].
    pub fn filename(id: u8, text: &str) -> Self {
        Self::utf16(id, tag::FILENAME, text)
    }

    /// A 32-bit integer field.
    pub fn integer(id: u8, value: i32) -> Self {
        Self::raw(id, tag::INTEGER, 4, value.to_le_bytes().to_vec())
    }

    /// A length field; encoded exactly like [`FixtureField::integer`].
    pub fn length(id: u8, value: i32) -> Self {
        Self::raw(id, tag::LENGTH, 4, value.to_le_bytes().to_vec())
    }

    /// A datetime field holding `secs` since 1970-01-01T00:00:00.
    pub fn datetime(id: u8, secs: i32) -> Self {
        Self::raw(id, tag::DATETIME, 4, secs.to_le_bytes().to_vec())
    }

    /// Override the declared payload capacity.
    #[must_use]
    pub fn with_max_size(mut self, max_size: i32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Override where this field's `next` pointer leads.
    #[must_use]
    pub fn with_next(mut self, next: Next) -> Self {
        self.next = next;
        self
    }

    fn utf16(id: u8, field_tag: u8, text: &str) -> Self {
        let mut data = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        let mut payload = (data.len() as i16).to_le_bytes().to_vec();
        payload.extend_from_slice(&data);
        let max_size = payload.len() as i32;
        Self::raw(id, field_tag, max_size, payload)
    }

    fn encoded_len(&self) -> usize {
        FIELD_HEADER_LEN + self.payload.len()
    }
}

/// Declarative description of a whole table/index pair.
#[derive(Debug, Clone, Default)]
pub struct LibraryFixture {
    columns: Vec<FixtureField>,
    rows: Vec<Vec<FixtureField>>,
    index_id: i32,
}

/// The encoded byte images.
#[derive(Debug, Clone)]
pub struct Fixture {
    /// Table (`.dat`) bytes.
    pub table: Vec<u8>,
    /// Index (`.idx`) bytes.
    pub index: Vec<u8>,
    /// Start offset of every record by index position (0 for empty records).
    pub record_offsets: Vec<i32>,
}

impl LibraryFixture {
    /// An empty fixture: no columns, no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column definition to the column record.
    #[must_use]
    pub fn column(mut self, id: u8, name: &str) -> Self {
        self.columns.push(FixtureField::column(id, name));
        self
    }

    /// Append several column definitions.
    #[must_use]
    pub fn columns(mut self, columns: &[(u8, &str)]) -> Self {
        for &(id, name) in columns {
            self.columns.push(FixtureField::column(id, name));
        }
        self
    }

    /// Append an arbitrary field to the column record.
    #[must_use]
    pub fn column_field(mut self, field: FixtureField) -> Self {
        self.columns.push(field);
        self
    }

    /// Append a data row.
    #[must_use]
    pub fn row(mut self, fields: Vec<FixtureField>) -> Self {
        self.rows.push(fields);
        self
    }

    /// Set the instance id written into the index header.
    #[must_use]
    pub fn index_id(mut self, id: i32) -> Self {
        self.index_id = id;
        self
    }

    /// Encode the table and index images.
    pub fn build(&self) -> Fixture {
        let mut table = TABLE_SIGNATURE.to_vec();
        let mut record_offsets = Vec::with_capacity(self.rows.len() + 2);

        record_offsets.push(write_record(&mut table, &self.columns));
        record_offsets.push(0);
        for row in &self.rows {
            record_offsets.push(write_record(&mut table, row));
        }

        let mut index = INDEX_SIGNATURE.to_vec();
        index.extend_from_slice(&(record_offsets.len() as i32).to_le_bytes());
        index.extend_from_slice(&self.index_id.to_le_bytes());
        for (position, offset) in record_offsets.iter().enumerate() {
            index.extend_from_slice(&offset.to_le_bytes());
            index.extend_from_slice(&(position as i32).to_le_bytes());
        }

        Fixture {
            table,
            index,
            record_offsets,
        }
    }
}

impl Fixture {
    /// Write `{stem}.dat` and `{stem}.idx` into `dir`; returns both paths.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from writing either file.
    pub fn write_to(&self, dir: &Path, stem: &str) -> io::Result<(PathBuf, PathBuf)> {
        let dat = dir.join(format!("{stem}.dat"));
        let idx = dir.join(format!("{stem}.idx"));
        fs::write(&dat, &self.table)?;
        fs::write(&idx, &self.index)?;
        Ok((dat, idx))
    }
}

/// Append one record to `table`, returning its start offset (0 when empty).
fn write_record(table: &mut Vec<u8>, fields: &[FixtureField]) -> i32 {
    if fields.is_empty() {
        return 0;
    }
    let start = table.len();
    let mut offsets = Vec::with_capacity(fields.len());
    let mut pos = start;
    for field in fields {
        offsets.push(pos as i32);
        pos += field.encoded_len();
    }

    for (i, field) in fields.iter().enumerate() {
        let next = match field.next {
            Next::Chain => offsets.get(i + 1).copied().unwrap_or(0),
            Next::Absolute(offset) => offset,
            Next::RecordStart => start as i32,
        };
        let prev = if i == 0 {
            0
        } else {
            offsets.get(i - 1).copied().unwrap_or(0)
        };
        table.push(field.id);
        table.push(field.tag);
        table.extend_from_slice(&field.max_size.to_le_bytes());
        table.extend_from_slice(&next.to_le_bytes());
        table.extend_from_slice(&prev.to_le_bytes());
        table.extend_from_slice(&field.payload);
    }
    start as i32
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn le_i32(bytes: &[u8], at: usize) -> i32 {
        i32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn index_counts_reserved_positions() {
        let f = LibraryFixture::new()
            .column(1, "title")
            .row(vec![FixtureField::string(1, "a")])
            .build();
        assert_eq!(le_i32(&f.index, 8), 3);
        assert_eq!(f.record_offsets.len(), 3);
        assert_eq!(f.record_offsets[1], 0);
    }

    #[test]
    fn chained_fields_point_at_each_other() {
        let row = vec![FixtureField::integer(1, 7), FixtureField::integer(2, 9)];
        let f = LibraryFixture::new().row(row).build();
        let start = f.record_offsets[2] as usize;
        let next = le_i32(&f.table, start + 6);
        assert_eq!(next as usize, start + FIELD_HEADER_LEN + 4);
        assert_eq!(le_i32(&f.table, next as usize + 6), 0);
        assert_eq!(le_i32(&f.table, next as usize + 10) as usize, start);
    }

    #[test]
    fn string_payload_has_bom_and_length_prefix() {
        let field = FixtureField::string(3, "ab");
        assert_eq!(&field.payload[..2], &6i16.to_le_bytes());
        assert_eq!(&field.payload[2..4], &[0xFF, 0xFE]);
        assert_eq!(&field.payload[4..], &[b'a', 0, b'b', 0]);
    }

    #[test]
    fn empty_column_record_has_zero_offset() {
        let f = LibraryFixture::new().build();
        assert_eq!(f.record_offsets, vec![0, 0]);
        assert_eq!(f.table, TABLE_SIGNATURE.to_vec());
    }
}
