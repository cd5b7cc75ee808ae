//! Integration tests: corrupt tables and indexes must fail loudly, never
//! yield wrong data.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::io::Cursor;

use nde::{FieldType, FormatError, NdeError, Table, TableOptions};
use nde_testing::{tag, FixtureField, LibraryFixture, Next};
use proptest::prelude::*;

type MemTable = Table<Cursor<Vec<u8>>>;

fn from_bytes(table: Vec<u8>, index: Vec<u8>) -> nde::Result<MemTable> {
    let options = TableOptions::default();
    Table::from_readers(Cursor::new(table), Cursor::new(index), &options)
}

fn open(fixture: &LibraryFixture) -> nde::Result<MemTable> {
    let built = fixture.build();
    from_bytes(built.table, built.index)
}

/// A table with a `title` column and the single data row `row`.
fn open_row(row: Vec<FixtureField>) -> MemTable {
    let fixture = LibraryFixture::new().column(1, "title").row(row);
    open(&fixture).unwrap()
}

fn format_error(err: NdeError) -> FormatError {
    match err {
        NdeError::Format(e) => e,
        other => panic!("expected a format error, got {other:?}"),
    }
}

fn unknown_tag() -> impl Strategy<Value = u8> {
    let unknown = |t: &u8| FieldType::try_from(*t).is_err();
    any::<u8>().prop_filter("unknown tag", unknown)
}

/// Offset of the second field of the first data row in `table`.
fn err_offset(table: &MemTable) -> u64 {
    let start = table.index().unwrap().offset(2).unwrap();
    // 14-byte header + 2-byte length + BOM + "ok" in UTF-16
    u64::try_from(start).unwrap() + 14 + 2 + 2 + 4
}

#[test]
fn unknown_tag_in_row_is_a_format_error_not_end_of_chain() {
    let mut table = open_row(vec![
        FixtureField::string(1, "ok"),
        FixtureField::raw(2, 7, 4, vec![0; 4]),
    ]);
    let err = table.records().unwrap().next().unwrap().unwrap_err();
    let expected = FormatError::UnknownFieldType {
        tag: 7,
        offset: err_offset(&table),
    };
    assert_eq!(format_error(err), expected);
}

#[test]
fn index_field_in_row_aborts_the_record() {
    let mut table = open_row(vec![FixtureField::raw(1, tag::INDEX, 8, vec![0; 8])]);
    let err = format_error(table.record(2).unwrap_err());
    let FormatError::UnsupportedFieldType { field_type, .. } = &err else {
        panic!("expected an unsupported field type, got {err:?}");
    };
    assert_eq!(*field_type, FieldType::Index);
}

#[test]
fn index_field_in_column_record_fails_open() {
    let field = FixtureField::raw(1, tag::INDEX, 0, Vec::new());
    let fixture = LibraryFixture::new().column_field(field);
    let err = open(&fixture).unwrap_err();
    assert_eq!(format_error(err).kind(), "unsupported_field_type");
}

#[test]
fn wrong_integer_width_fails_decoding() {
    let fixture = LibraryFixture::new()
        .column(15, "playcount")
        .row(vec![FixtureField::integer(15, 1).with_max_size(2)]);
    let mut table = open(&fixture).unwrap();
    let err = format_error(table.record(2).unwrap_err());
    assert!(matches!(err, FormatError::IntegerWidth { size: 2, .. }));
}

#[test]
fn truncated_string_payload_fails_decoding() {
    let fixture = LibraryFixture::new()
        .column(1, "title")
        .row(vec![FixtureField::string(1, "a long enough title")]);
    let mut built = fixture.build();
    built.table.truncate(built.table.len() - 6);
    let mut table = from_bytes(built.table, built.index).unwrap();
    let err = format_error(table.record(2).unwrap_err());
    assert!(matches!(err, FormatError::Truncated { .. }));
}

#[test]
fn cyclic_row_chain_is_bounded() {
    let mut table = open_row(vec![
        FixtureField::string(1, "loop"),
        FixtureField::integer(2, 0).with_next(Next::RecordStart),
    ]);
    let err = format_error(table.record(2).unwrap_err());
    assert!(matches!(err, FormatError::ChainTooLong { .. }));
}

#[test]
fn index_entry_pointing_past_table_end_is_truncated() {
    let mut built = LibraryFixture::new().column(1, "title").build();
    // append a third entry that points far past the end of the table
    built.index[8..12].copy_from_slice(&3i32.to_le_bytes());
    built.index.extend_from_slice(&0x00FF_FFFFi32.to_le_bytes());
    built.index.extend_from_slice(&2i32.to_le_bytes());
    let mut table = from_bytes(built.table, built.index).unwrap();
    assert_eq!(table.record_count().unwrap(), 1);
    let err = table.records().unwrap().next().unwrap().unwrap_err();
    let expected = FormatError::Truncated {
        offset: 0x00FF_FFFF,
    };
    assert_eq!(format_error(err), expected);
}

#[test]
fn index_with_no_entries_cannot_locate_the_column_record() {
    let mut idx = b"NDEINDEX".to_vec();
    idx.extend_from_slice(&0i32.to_le_bytes());
    idx.extend_from_slice(&0i32.to_le_bytes());
    let err = from_bytes(b"NDETABLE".to_vec(), idx).unwrap_err();
    let NdeError::OutOfRange { position, len } = err else {
        panic!("expected an out-of-range error");
    };
    assert_eq!((position, len), (0, 0));
}

proptest! {
    #[test]
    fn unknown_tags_never_decode(tag_byte in unknown_tag()) {
        let mut table = open_row(vec![FixtureField::raw(1, tag_byte, 0, Vec::new())]);
        let err = format_error(table.record(2).unwrap_err());
        prop_assert!(
            matches!(err, FormatError::UnknownFieldType { tag, .. } if tag == tag_byte),
            "unknown tag {} must be rejected",
            tag_byte
        );
    }

    #[test]
    fn strings_decode_without_bom_or_trailing_whitespace(text in "[a-zA-Z0-9 é☃]{0,40}") {
        let mut table = open_row(vec![FixtureField::string(1, &text)]);
        let record = table.record(2).unwrap();
        let title = record.get_str(nde::MetadataField::Title);
        prop_assert_eq!(title, Some(text.trim_end()));
    }
}
