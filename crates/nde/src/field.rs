//! Field decoder — one self-describing value in the table file.
//!
//! Every field starts with a 14-byte [`FieldHeader`]; the type tag in the
//! header selects the payload layout:
//!
//! | Tag | Type       | Payload                                              |
//! |-----|------------|------------------------------------------------------|
//! | 0   | `Column`   | sub-type u8, unique u8, len u8, ASCII name           |
//! | 1   | `Index`    | not decodable (redirection); always an error         |
//! | 3   | `String`   | len i16, then `len` bytes: BOM + UTF-16LE text       |
//! | 4   | `Integer`  | i32 (declared width must be 4)                       |
//! | 10  | `Datetime` | i32 seconds since 1970-01-01T00:00:00                |
//! | 11  | `Length`   | as `Integer`                                         |
//! | 12  | `Filename` | as `String`                                          |
//!
//! The whole header is read in one pass and the payload parser is chosen
//! from the tag it contains.

use std::fmt;
use std::io::{Read, Seek};

use byteorder::{ReadBytesExt, LE};
use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;

use crate::binary::{read_array, seek_to, truncated_at, FieldHeader};
use crate::error::{FormatError, Result};

// ---------------------------------------------------------------------------
// FieldType
// ---------------------------------------------------------------------------

/// Wire type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum FieldType {
    /// Column definition in the column record.
    Column = 0,
    /// Index definition; a redirection this reader does not follow.
    Index = 1,
    /// UTF-16 text.
    String = 3,
    /// 32-bit signed integer.
    Integer = 4,
    /// Seconds since the Unix epoch, zone-less.
    Datetime = 10,
    /// Integer-encoded duration.
    Length = 11,
    /// UTF-16 file path.
    Filename = 12,
}

impl FieldType {
    /// Raw tag byte.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Lowercase display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Column => "column",
            Self::Index => "index",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Datetime => "datetime",
            Self::Length => "length",
            Self::Filename => "filename",
        }
    }
}

impl TryFrom<u8> for FieldType {
    /// The unrecognised tag.
    type Error = u8;

    fn try_from(tag: u8) -> std::result::Result<Self, Self::Error> {
        Ok(match tag {
            0 => Self::Column,
            1 => Self::Index,
            3 => Self::String,
            4 => Self::Integer,
            10 => Self::Datetime,
            11 => Self::Length,
            12 => Self::Filename,
            other => return Err(other),
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// Column definition carried by a [`FieldType::Column`] field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    /// Logical field name, e.g. `"artist"`.
    pub name: String,
    /// Declared type tag of the column's values (not validated).
    pub column_type: u8,
    /// Unique-index flag; read but not acted upon.
    pub unique: bool,
}

/// Decoded payload, one variant per wire type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Column definition.
    Column(ColumnDef),
    /// Text with the byte-order mark removed and trailing whitespace trimmed.
    String(String),
    /// 32-bit signed integer.
    Integer(i32),
    /// Epoch offset as a naive timestamp.
    Datetime(NaiveDateTime),
    /// Integer-valued length.
    Length(i32),
    /// File path; decoded like [`FieldValue::String`].
    Filename(String),
}

impl FieldValue {
    /// Wire type this value was decoded from.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Column(_) => FieldType::Column,
            Self::String(_) => FieldType::String,
            Self::Integer(_) => FieldType::Integer,
            Self::Datetime(_) => FieldType::Datetime,
            Self::Length(_) => FieldType::Length,
            Self::Filename(_) => FieldType::Filename,
        }
    }

    /// Text of a `String` or `Filename` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Filename(s) => Some(s),
            _ => None,
        }
    }

    /// Number held by an `Integer` or `Length` value.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Integer(v) | Self::Length(v) => Some(*v),
            _ => None,
        }
    }

    /// Timestamp held by a `Datetime` value.
    #[must_use]
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Datetime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Definition held by a `Column` value.
    #[must_use]
    pub fn as_column(&self) -> Option<&ColumnDef> {
        match self {
            Self::Column(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(c) => f.write_str(&c.name),
            Self::String(s) | Self::Filename(s) => f.write_str(s),
            Self::Integer(v) | Self::Length(v) => write!(f, "{v}"),
            Self::Datetime(dt) => write!(f, "{dt}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// A decoded field: where it was, its header, and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    offset: u64,
    header: FieldHeader,
    value: FieldValue,
}

impl Field {
    /// Field id within its record.
    #[must_use]
    pub fn id(&self) -> u8 {
        self.header.id
    }

    /// Wire type.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.value.field_type()
    }

    /// Raw header as read from disk.
    #[must_use]
    pub fn header(&self) -> &FieldHeader {
        &self.header
    }

    /// Decoded payload.
    #[must_use]
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Consume the field, keeping only its payload.
    #[must_use]
    pub fn into_value(self) -> FieldValue {
        self.value
    }

    /// Absolute offset of the field header.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Offset of the next field in the chain, or `None` at the end.
    #[must_use]
    pub fn next_offset(&self) -> Option<u64> {
        let next = u64::try_from(self.header.next_offset).ok()?;
        (next > 0).then_some(next)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode the field whose header starts at `offset`.
///
/// Offsets `<= 0` address no field and yield `Ok(None)`.
///
/// # Errors
///
/// - [`FormatError::UnknownFieldType`] for a tag outside the known set
/// - [`FormatError::UnsupportedFieldType`] for an `Index` field
/// - [`FormatError::IntegerWidth`] for an integer not declared as 4 bytes
/// - [`FormatError::NegativeLength`] / [`FormatError::MissingBom`] for bad strings
/// - [`FormatError::Truncated`] when the file ends inside the field
/// - `NdeError::Io` for any other read failure
pub fn decode_field<R: Read + Seek>(reader: &mut R, offset: i32) -> Result<Option<Field>> {
    let Some(pos) = u64::try_from(offset).ok().filter(|&p| p > 0) else {
        return Ok(None);
    };
    decode_at(reader, pos).map(Some)
}

/// Decode the field at the absolute position `pos`.
pub(crate) fn decode_at<R: Read + Seek>(reader: &mut R, pos: u64) -> Result<Field> {
    seek_to(reader, pos)?;
    let header = FieldHeader::decode(&read_array(reader, pos)?);
    let field_type = FieldType::try_from(header.tag)
        .map_err(|tag| FormatError::UnknownFieldType { tag, offset: pos })?;

    let value = match field_type {
        FieldType::Column => FieldValue::Column(read_column(reader, pos)?),
        FieldType::Index => {
            return Err(FormatError::UnsupportedFieldType {
                field_type,
                offset: pos,
            }
            .into());
        }
        FieldType::String => FieldValue::String(read_utf16(reader, pos)?),
        FieldType::Integer => FieldValue::Integer(read_integer(reader, &header, pos)?),
        FieldType::Datetime => FieldValue::Datetime(read_datetime(reader, pos)?),
        FieldType::Length => FieldValue::Length(read_integer(reader, &header, pos)?),
        FieldType::Filename => FieldValue::Filename(read_utf16(reader, pos)?),
    };

    Ok(Field {
        offset: pos,
        header,
        value,
    })
}

fn read_column<R: Read>(reader: &mut R, pos: u64) -> Result<ColumnDef> {
    let [column_type, unique, len] = read_array::<_, 3>(reader, pos)?;
    let mut data = vec![0u8; usize::from(len)];
    reader.read_exact(&mut data).map_err(truncated_at(pos))?;
    // Non-ASCII bytes become '?', matching an ASCII decoder's replacement.
    let name = data
        .iter()
        .map(|&b| if b.is_ascii() { char::from(b) } else { '?' })
        .collect();
    Ok(ColumnDef {
        name,
        column_type,
        unique: unique != 0,
    })
}

fn read_utf16<R: Read>(reader: &mut R, pos: u64) -> Result<String> {
    let raw_len = reader.read_i16::<LE>().map_err(truncated_at(pos))?;
    let Ok(len) = usize::try_from(raw_len) else {
        return Err(FormatError::NegativeLength {
            len: raw_len,
            offset: pos,
        }
        .into());
    };
    if len < 2 {
        return Err(FormatError::MissingBom { len, offset: pos }.into());
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).map_err(truncated_at(pos))?;

    let (bom, text) = data.split_at(2);
    if bom != [0xFF, 0xFE] {
        tracing::debug!(
            offset = pos,
            "string field without a UTF-16LE byte-order mark"
        );
    }
    let mut value = decode_utf16le(text);
    let trimmed = value.trim_end().len();
    value.truncate(trimmed);
    Ok(value)
}

/// Lossy UTF-16LE decode; unpaired surrogates and a dangling odd byte become U+FFFD.
fn decode_utf16le(bytes: &[u8]) -> String {
    let chunks = bytes.chunks_exact(2);
    let dangling = !chunks.remainder().is_empty();
    let units = chunks
        .filter_map(|pair| <[u8; 2]>::try_from(pair).ok())
        .map(u16::from_le_bytes);
    let mut text: String = char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    if dangling {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

fn read_integer<R: Read>(reader: &mut R, header: &FieldHeader, pos: u64) -> Result<i32> {
    if header.max_size != 4 {
        return Err(FormatError::IntegerWidth {
            size: header.max_size,
            offset: pos,
        }
        .into());
    }
    reader.read_i32::<LE>().map_err(truncated_at(pos))
}

fn read_datetime<R: Read>(reader: &mut R, pos: u64) -> Result<NaiveDateTime> {
    let secs = reader.read_i32::<LE>().map_err(truncated_at(pos))?;
    let dt = DateTime::from_timestamp(i64::from(secs), 0)
        .ok_or(FormatError::TimestampOutOfRange { secs, offset: pos })?;
    Ok(dt.naive_utc())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_sign_loss
)]
mod tests {
    use super::*;
    use crate::error::NdeError;
    use chrono::NaiveDate;
    use nde_testing::{tag, FixtureField, LibraryFixture, FIELD_HEADER_LEN};
    use std::io::Cursor;

    /// Table image holding `field` as the only field of record 2.
    fn single(field: FixtureField) -> (Cursor<Vec<u8>>, i32) {
        let fixture = LibraryFixture::new().row(vec![field]).build();
        let offset = fixture.record_offsets[2];
        (Cursor::new(fixture.table), offset)
    }

    fn decode_one(field: FixtureField) -> Result<Field> {
        let (mut cur, offset) = single(field);
        let field = decode_field(&mut cur, offset)?;
        Ok(field.expect("positive offset"))
    }

    fn format_err(result: Result<Field>) -> FormatError {
        match result {
            Err(NdeError::Format(e)) => e,
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn string_strips_bom_and_trailing_whitespace() {
        let field = FixtureField::string(7, "Miles Davis  \t");
        let f = decode_one(field).unwrap();
        assert_eq!(f.id(), 7);
        assert_eq!(f.field_type(), FieldType::String);
        assert_eq!(f.value().as_str(), Some("Miles Davis"));
    }

    #[test]
    fn string_keeps_leading_whitespace_and_non_ascii() {
        let field = FixtureField::string(1, "  Björk — Jóga");
        let f = decode_one(field).unwrap();
        assert_eq!(f.value().as_str(), Some("  Björk — Jóga"));
    }

    #[test]
    fn string_consumes_exactly_declared_length() {
        let (mut cur, offset) = single(FixtureField::string(1, "abc"));
        decode_field(&mut cur, offset).unwrap();
        // header + i16 prefix + BOM + 3 UTF-16 units
        let expected = offset as u64 + FIELD_HEADER_LEN as u64 + 2 + 2 + 6;
        assert_eq!(cur.position(), expected);
    }

    #[test]
    fn bom_only_string_is_empty() {
        let f = decode_one(FixtureField::string(1, "")).unwrap();
        assert_eq!(f.value().as_str(), Some(""));
    }

    #[test]
    fn filename_keeps_its_own_tag() {
        let field = FixtureField::filename(0, "C:\\Music\\a.mp3");
        let f = decode_one(field).unwrap();
        assert_eq!(f.field_type(), FieldType::Filename);
        assert_eq!(f.value().as_str(), Some("C:\\Music\\a.mp3"));
    }

    #[test]
    fn string_shorter_than_bom_is_rejected() {
        let payload = 1i16.to_le_bytes().iter().copied().chain([0xFF]).collect();
        let err = format_err(decode_one(FixtureField::raw(1, tag::STRING, 3, payload)));
        assert!(matches!(err, FormatError::MissingBom { len: 1, .. }));
    }

    #[test]
    fn negative_string_length_is_rejected() {
        let payload = (-4i16).to_le_bytes().to_vec();
        let err = format_err(decode_one(FixtureField::raw(1, tag::STRING, 2, payload)));
        assert!(matches!(err, FormatError::NegativeLength { len: -4, .. }));
    }

    #[test]
    fn string_longer_than_file_is_truncated() {
        let mut payload = 40i16.to_le_bytes().to_vec();
        payload.extend_from_slice(&[0xFF, 0xFE, b'a', 0]);
        let (mut cur, offset) = single(FixtureField::raw(1, tag::STRING, 42, payload));
        let err = decode_field(&mut cur, offset).unwrap_err();
        assert!(matches!(
            err,
            NdeError::Format(FormatError::Truncated { offset: o }) if o == offset as u64
        ));
    }

    #[test]
    fn integer_and_length_decode_identically() {
        let i = decode_one(FixtureField::integer(4, -17)).unwrap();
        let l = decode_one(FixtureField::length(4, -17)).unwrap();
        assert_eq!(i.field_type(), FieldType::Integer);
        assert_eq!(l.field_type(), FieldType::Length);
        assert_eq!(i.value().as_i32(), Some(-17));
        assert_eq!(l.value().as_i32(), Some(-17));
    }

    #[test]
    fn integer_with_wrong_width_is_rejected() {
        for width in [0, 2, 8] {
            let field = FixtureField::integer(1, 5).with_max_size(width);
            let expected = FormatError::IntegerWidth {
                size: width,
                offset: 8,
            };
            assert_eq!(format_err(decode_one(field)), expected);
        }
    }

    #[test]
    fn length_with_wrong_width_is_rejected() {
        let err = format_err(decode_one(FixtureField::length(1, 5).with_max_size(8)));
        assert!(matches!(err, FormatError::IntegerWidth { size: 8, .. }));
    }

    #[test]
    fn datetime_zero_is_the_epoch() {
        let f = decode_one(FixtureField::datetime(9, 0)).unwrap();
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(f.value().as_datetime(), Some(epoch));
    }

    #[test]
    fn datetime_before_epoch_is_supported() {
        let f = decode_one(FixtureField::datetime(9, -86_400)).unwrap();
        let day_before = NaiveDate::from_ymd_opt(1969, 12, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(f.value().as_datetime(), Some(day_before));
    }

    #[test]
    fn column_reads_name_type_and_unique_flag() {
        let mut field = FixtureField::column_typed(2, "artist", tag::STRING);
        field.payload[1] = 1;
        let f = decode_one(field).unwrap();
        let col = f.value().as_column().unwrap();
        assert_eq!(col.name, "artist");
        assert_eq!(col.column_type, tag::STRING);
        assert!(col.unique);
    }

    #[test]
    fn column_replaces_non_ascii_bytes() {
        let payload = vec![tag::STRING, 0, 3, b'a', 0xE9, b'b'];
        let field = FixtureField::raw(1, tag::COLUMN, 6, payload);
        let f = decode_one(field).unwrap();
        assert_eq!(f.value().as_column().unwrap().name, "a?b");
    }

    #[test]
    fn unknown_tag_is_a_format_error() {
        for unknown in [2u8, 5, 13, 255] {
            let err = format_err(decode_one(FixtureField::raw(1, unknown, 4, vec![0; 4])));
            let expected = FormatError::UnknownFieldType {
                tag: unknown,
                offset: 8,
            };
            assert_eq!(err, expected);
        }
    }

    #[test]
    fn index_tag_is_unsupported() {
        let err = format_err(decode_one(FixtureField::raw(1, tag::INDEX, 4, vec![0; 4])));
        let expected = FormatError::UnsupportedFieldType {
            field_type: FieldType::Index,
            offset: 8,
        };
        assert_eq!(err, expected);
    }

    #[test]
    fn non_positive_offset_is_not_present() {
        let (mut cur, _) = single(FixtureField::integer(1, 1));
        assert!(decode_field(&mut cur, 0).unwrap().is_none());
        assert!(decode_field(&mut cur, -12).unwrap().is_none());
    }

    #[test]
    fn header_past_end_of_file_is_truncated() {
        let (mut cur, _) = single(FixtureField::integer(1, 1));
        let err = decode_field(&mut cur, 10_000).unwrap_err();
        assert!(matches!(
            err,
            NdeError::Format(FormatError::Truncated { offset: 10_000 })
        ));
    }

    #[test]
    fn field_type_tags_round_trip_through_try_from() {
        for ty in [
            FieldType::Column,
            FieldType::Index,
            FieldType::String,
            FieldType::Integer,
            FieldType::Datetime,
            FieldType::Length,
            FieldType::Filename,
        ] {
            assert_eq!(FieldType::try_from(ty.tag()), Ok(ty));
        }
    }

    #[test]
    fn dangling_odd_byte_becomes_replacement_char() {
        assert_eq!(decode_utf16le(&[b'a', 0, b'b']), "a\u{FFFD}");
    }

    #[test]
    fn unpaired_surrogate_becomes_replacement_char() {
        assert_eq!(decode_utf16le(&[0x00, 0xD8, b'x', 0]), "\u{FFFD}x");
    }
}
