//! `Records` — lazy, forward-only scan over the data rows of a [`Table`].
//!
//! Each step looks up the next logical position in the index and follows
//! that record's field chain. Nothing is decoded ahead of the consumer, and
//! stopping early simply drops the iterator.
//!
//! [`Table`]: crate::Table

use std::io::{Read, Seek};
use std::iter::FusedIterator;
use std::ops::Range;

use crate::error::Result;
use crate::index::Index;
use crate::record::Record;
use crate::schema::Schema;

/// Iterator over the records at positions `2..index.len()`, in index order.
///
/// Yields exactly `record_count` items. A record that fails to decode is
/// yielded as `Err` and the scan moves on to the next position.
#[derive(Debug)]
pub struct Records<'a, R> {
    reader: &'a mut R,
    index: &'a Index,
    schema: &'a Schema,
    positions: Range<usize>,
    max_chain_len: usize,
}

impl<'a, R: Read + Seek> Records<'a, R> {
    pub(crate) fn new(
        reader: &'a mut R,
        index: &'a Index,
        schema: &'a Schema,
        max_chain_len: usize,
    ) -> Self {
        Self {
            reader,
            index,
            schema,
            positions: index.data_positions(),
            max_chain_len,
        }
    }

    fn decode(&mut self, position: usize) -> Result<Record<'a>> {
        let start = self.index.offset(position)?;
        Record::materialize(
            &mut *self.reader,
            start,
            Some(self.schema),
            self.max_chain_len,
        )
    }
}

impl<'a, R: Read + Seek> Iterator for Records<'a, R> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let position = self.positions.next()?;
        let record = self.decode(position);
        if let Err(e) = &record {
            tracing::debug!(position, error = %e, "record failed to decode");
        }
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl<R: Read + Seek> ExactSizeIterator for Records<'_, R> {}

impl<R: Read + Seek> FusedIterator for Records<'_, R> {}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use crate::error::{FormatError, NdeError};
    use crate::schema::MetadataField;
    use crate::table::{Table, TableOptions};
    use nde_testing::{FixtureField, LibraryFixture};
    use std::io::Cursor;

    fn table(fixture: LibraryFixture) -> Table<Cursor<Vec<u8>>> {
        let built = fixture.build();
        Table::from_readers(
            Cursor::new(built.table),
            Cursor::new(built.index),
            &TableOptions::default(),
        )
        .unwrap()
    }

    fn titled(titles: &[&str]) -> LibraryFixture {
        let mut fixture = LibraryFixture::new().column(1, "title");
        for title in titles {
            fixture = fixture.row(vec![FixtureField::string(1, title)]);
        }
        fixture
    }

    #[test]
    fn yields_record_count_items_in_index_order() {
        let mut table = table(titled(&["one", "two", "three"]));
        let count = table.record_count().unwrap();
        let titles: Vec<String> = table
            .records()
            .unwrap()
            .map(|r| r.unwrap().get_str(MetadataField::Title).unwrap().to_owned())
            .collect();
        assert_eq!(count, 3);
        assert_eq!(titles, vec!["one", "two", "three"]);
    }

    #[test]
    fn exact_size_matches_record_count() {
        let mut table = table(titled(&["a", "b"]));
        let mut records = table.records().unwrap();
        assert_eq!(records.len(), 2);
        records.next();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn every_call_restarts_at_first_row() {
        let mut table = table(titled(&["a", "b", "c"]));
        let first = table
            .records()
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .get_str(MetadataField::Title)
            .map(str::to_owned);
        let again: Vec<_> = table.records().unwrap().collect();
        assert_eq!(first.as_deref(), Some("a"));
        assert_eq!(again.len(), 3);
    }

    #[test]
    fn empty_table_yields_nothing() {
        let mut table = table(LibraryFixture::new().column(1, "title"));
        assert_eq!(table.records().unwrap().count(), 0);
    }

    #[test]
    fn corrupt_row_does_not_end_the_scan() {
        let mut table = table(
            LibraryFixture::new()
                .column(1, "title")
                .row(vec![FixtureField::string(1, "good")])
                .row(vec![FixtureField::integer(1, 7).with_max_size(8)])
                .row(vec![FixtureField::string(1, "also good")]),
        );
        let results: Vec<_> = table.records().unwrap().collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(NdeError::Format(FormatError::IntegerWidth { size: 8, .. }))
        ));
        assert_eq!(
            results[2].as_ref().unwrap().get_str(MetadataField::Title),
            Some("also good")
        );
    }

    #[test]
    fn stays_exhausted() {
        let mut table = table(titled(&["only"]));
        let mut records = table.records().unwrap();
        assert!(records.next().is_some());
        assert!(records.next().is_none());
        assert!(records.next().is_none());
    }
}
