//! Record — the fields reached by following one chain.
//!
//! A record has no identity beyond its fields. It is materialized fresh on
//! every traversal and never cached.

use std::io::{Read, Seek};

use chrono::NaiveDateTime;

use crate::error::{FormatError, Result};
use crate::field::{decode_at, Field};
use crate::schema::{MetadataField, Schema};

/// Default bound on the number of fields followed in one chain.
pub const DEFAULT_MAX_CHAIN_LEN: usize = 1024;

/// One row of the table: its fields in chain order, plus the schema used to
/// resolve logical names.
#[derive(Debug, Clone, Default)]
pub struct Record<'a> {
    fields: Vec<Field>,
    schema: Option<&'a Schema>,
}

impl<'a> Record<'a> {
    /// Follow the field chain starting at `start`.
    ///
    /// A `start` of zero or less yields a record with no fields. At most
    /// `max_chain_len` fields are followed.
    ///
    /// # Errors
    ///
    /// - [`FormatError::ChainTooLong`] if the chain has not ended after
    ///   `max_chain_len` fields (this includes cycles)
    /// - any error from decoding a field of the chain
    pub fn materialize<R: Read + Seek>(
        reader: &mut R,
        start: i32,
        schema: Option<&'a Schema>,
        max_chain_len: usize,
    ) -> Result<Self> {
        let mut fields = Vec::new();
        let Some(start) = u64::try_from(start).ok().filter(|&s| s > 0) else {
            return Ok(Self { fields, schema });
        };

        let mut next = Some(start);
        while let Some(pos) = next {
            if fields.len() >= max_chain_len {
                return Err(FormatError::ChainTooLong {
                    start,
                    limit: max_chain_len,
                }
                .into());
            }
            let field = decode_at(reader, pos)?;
            next = field.next_offset();
            fields.push(field);
        }

        tracing::trace!(start, fields = fields.len(), "materialized record");
        Ok(Self { fields, schema })
    }

    /// Field for logical `name`, resolved through the schema.
    ///
    /// `None` when the record has no schema, the schema does not map `name`,
    /// or this record has no field with the mapped id.
    #[must_use]
    pub fn get_by_name(&self, name: MetadataField) -> Option<&Field> {
        let id = self.schema?.get(name)?;
        self.get_by_id(id)
    }

    /// First field whose id is `id`.
    #[must_use]
    pub fn get_by_id(&self, id: u8) -> Option<&Field> {
        self.fields.iter().find(|f| f.id() == id)
    }

    /// Text of a String or Filename field.
    #[must_use]
    pub fn get_str(&self, name: MetadataField) -> Option<&str> {
        self.get_by_name(name)?.value().as_str()
    }

    /// Value of an Integer or Length field.
    #[must_use]
    pub fn get_i32(&self, name: MetadataField) -> Option<i32> {
        self.get_by_name(name)?.value().as_i32()
    }

    /// Value of a Datetime field.
    #[must_use]
    pub fn get_datetime(&self, name: MetadataField) -> Option<NaiveDateTime> {
        self.get_by_name(name)?.value().as_datetime()
    }

    /// All fields, in chain order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` for a record with no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Schema this record resolves names against.
    #[must_use]
    pub fn schema(&self) -> Option<&'a Schema> {
        self.schema
    }

    /// Consume the record, keeping its fields.
    #[must_use]
    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::cast_possible_truncation
)]
mod tests {
    use super::*;
    use crate::error::NdeError;
    use crate::field::FieldType;
    use nde_testing::{tag, FixtureField, LibraryFixture, Next};
    use proptest::prelude::*;
    use std::io::Cursor;

    /// Table bytes and the start offset of the first data row.
    fn one_row(fields: Vec<FixtureField>) -> (Cursor<Vec<u8>>, i32) {
        let fixture = LibraryFixture::new().row(fields).build();
        (Cursor::new(fixture.table), fixture.record_offsets[2])
    }

    fn read<'a>(
        cur: &mut Cursor<Vec<u8>>,
        start: i32,
        schema: Option<&'a Schema>,
    ) -> Result<Record<'a>> {
        Record::materialize(cur, start, schema, DEFAULT_MAX_CHAIN_LEN)
    }

    fn schema(pairs: &[(MetadataField, u8)]) -> Schema {
        let mut schema = Schema::new();
        for &(name, id) in pairs {
            schema.insert(name, id);
        }
        schema
    }

    #[test]
    fn follows_chain_in_order() {
        let (mut cur, start) = one_row(vec![
            FixtureField::string(3, "So What"),
            FixtureField::integer(9, 5),
            FixtureField::filename(1, r"C:\music\so_what.mp3"),
        ]);
        let record = read(&mut cur, start, None).unwrap();
        let ids: Vec<u8> = record.fields().iter().map(Field::id).collect();
        assert_eq!(ids, vec![3, 9, 1]);
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn non_positive_start_is_empty() {
        let (mut cur, _) = one_row(vec![FixtureField::integer(1, 1)]);
        for start in [0, -1, i32::MIN] {
            let record = read(&mut cur, start, None).unwrap();
            assert!(record.is_empty());
        }
    }

    #[test]
    fn get_by_name_resolves_through_schema() {
        let schema = schema(&[(MetadataField::Artist, 7), (MetadataField::Title, 2)]);
        let (mut cur, start) = one_row(vec![
            FixtureField::string(2, "So What"),
            FixtureField::string(7, "Miles Davis"),
        ]);
        let record = read(&mut cur, start, Some(&schema)).unwrap();
        assert_eq!(record.get_str(MetadataField::Artist), Some("Miles Davis"));
        assert_eq!(record.get_str(MetadataField::Title), Some("So What"));
    }

    #[test]
    fn absent_in_schema_and_absent_in_record_look_the_same() {
        let schema = schema(&[(MetadataField::Rating, 12)]);
        let (mut cur, start) = one_row(vec![FixtureField::string(2, "x")]);
        let record = read(&mut cur, start, Some(&schema)).unwrap();
        // mapped, but no field with id 12
        assert!(record.get_by_name(MetadataField::Rating).is_none());
        // not mapped at all
        assert!(record.get_by_name(MetadataField::Genre).is_none());
    }

    #[test]
    fn get_by_name_without_schema_is_none() {
        let (mut cur, start) = one_row(vec![FixtureField::string(2, "x")]);
        let record = read(&mut cur, start, None).unwrap();
        assert!(record.get_by_name(MetadataField::Title).is_none());
        assert!(record.get_by_id(2).is_some());
    }

    #[test]
    fn get_by_id_returns_first_match() {
        let (mut cur, start) = one_row(vec![
            FixtureField::integer(4, 10),
            FixtureField::integer(4, 20),
        ]);
        let record = read(&mut cur, start, None).unwrap();
        assert_eq!(record.get_by_id(4).unwrap().value().as_i32(), Some(10));
        assert!(record.get_by_id(5).is_none());
    }

    #[test]
    fn typed_getters_reject_other_variants() {
        let mut schema = Schema::new();
        schema.insert(MetadataField::PlayCount, 1);
        schema.insert(MetadataField::LastPlay, 2);
        let (mut cur, start) = one_row(vec![
            FixtureField::string(1, "not a number"),
            FixtureField::datetime(2, 86_400),
        ]);
        let record = read(&mut cur, start, Some(&schema)).unwrap();
        assert_eq!(record.get_i32(MetadataField::PlayCount), None);
        assert_eq!(
            record.get_str(MetadataField::PlayCount),
            Some("not a number")
        );
        let when = record.get_datetime(MetadataField::LastPlay).unwrap();
        assert_eq!(when.to_string(), "1970-01-02 00:00:00");
    }

    #[test]
    fn cycle_is_reported_as_chain_too_long() {
        let (mut cur, start) = one_row(vec![
            FixtureField::integer(1, 1),
            FixtureField::integer(2, 2).with_next(Next::RecordStart),
        ]);
        let err = Record::materialize(&mut cur, start, None, 16).unwrap_err();
        assert!(matches!(
            err,
            NdeError::Format(FormatError::ChainTooLong { limit: 16, .. })
        ));
    }

    #[test]
    fn chain_of_exactly_the_limit_is_accepted() {
        let (mut cur, start) = one_row((0..4).map(|i| FixtureField::integer(i, 0)).collect());
        let record = Record::materialize(&mut cur, start, None, 4).unwrap();
        assert_eq!(record.len(), 4);
        assert!(Record::materialize(&mut cur, start, None, 3).is_err());
    }

    #[test]
    fn bad_field_mid_chain_fails_the_record() {
        let (mut cur, start) = one_row(vec![
            FixtureField::integer(1, 1),
            FixtureField::raw(2, 99, 0, Vec::new()),
            FixtureField::integer(3, 3),
        ]);
        let err = read(&mut cur, start, None).unwrap_err();
        assert!(matches!(
            err,
            NdeError::Format(FormatError::UnknownFieldType { tag: 99, .. })
        ));
    }

    #[test]
    fn index_field_in_chain_is_a_hard_failure() {
        let (mut cur, start) = one_row(vec![
            FixtureField::integer(1, 1),
            FixtureField::raw(2, tag::INDEX, 0, Vec::new()),
        ]);
        let err = read(&mut cur, start, None).unwrap_err();
        let Some(FormatError::UnsupportedFieldType { field_type, .. }) = err.as_format() else {
            panic!("expected an unsupported field type, got {err}");
        };
        assert_eq!(*field_type, FieldType::Index);
    }

    #[test]
    fn next_pointer_past_end_is_truncated() {
        let far = Next::Absolute(1_000_000);
        let (mut cur, start) = one_row(vec![FixtureField::integer(1, 1).with_next(far)]);
        let err = read(&mut cur, start, None).unwrap_err();
        assert!(matches!(
            err,
            NdeError::Format(FormatError::Truncated { offset: 1_000_000 })
        ));
    }

    proptest! {
        #[test]
        fn chain_of_n_fields_yields_n_in_order(
            values in prop::collection::vec(any::<i32>(), 1..40)
        ) {
            let fields = values
                .iter()
                .enumerate()
                .map(|(i, v)| FixtureField::integer(i as u8, *v))
                .collect();
            let (mut cur, start) = one_row(fields);
            let record = read(&mut cur, start, None).unwrap();
            let decoded: Vec<i32> = record
                .fields()
                .iter()
                .filter_map(|f| f.value().as_i32())
                .collect();
            prop_assert_eq!(decoded, values);
        }
    }
}
