//! `Table` — an open NDE table: data stream, index and schema.
//!
//! Opening validates the `NDETABLE` signature before touching the index, then
//! loads the index and builds the schema from the column record at position 0.
//!
//! # Access patterns
//!
//! | Method | Cost | Notes |
//! |--------|------|-------|
//! | `record_count()` | O(1) | Entries minus the two reserved positions |
//! | `record(position)` | one seek per field | Any logical position, 0 included |
//! | `records()` | one seek per field per row | Fresh scan from position 2 on every call |
//!
//! A table holds a single read cursor. It is not safe to interleave reads
//! from several threads; concurrent scans need one `Table` each.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use crate::binary::{seek_to, signature_matches, TABLE_SIGNATURE};
use crate::error::{FormatError, NdeError, Result};
use crate::index::{Index, COLUMN_POSITION};
use crate::record::{Record, DEFAULT_MAX_CHAIN_LEN};
use crate::records::Records;
use crate::schema::Schema;

// ---------------------------------------------------------------------------
// TableOptions
// ---------------------------------------------------------------------------

/// Settings applied when opening a [`Table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    index_path: Option<PathBuf>,
    max_chain_len: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            index_path: None,
            max_chain_len: DEFAULT_MAX_CHAIN_LEN,
        }
    }
}

impl TableOptions {
    /// Default options: index next to the data file, chains of up to
    /// [`DEFAULT_MAX_CHAIN_LEN`] fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the index from `path` instead of the data path with an `idx` extension.
    #[must_use]
    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(path.into());
        self
    }

    /// Fail a record whose chain has not ended after `limit` fields.
    #[must_use]
    pub fn with_max_chain_len(mut self, limit: usize) -> Self {
        self.max_chain_len = limit;
        self
    }

    /// Explicit index path, if one was set.
    #[must_use]
    pub fn index_path(&self) -> Option<&Path> {
        self.index_path.as_deref()
    }

    /// Maximum number of fields followed per record.
    #[must_use]
    pub fn max_chain_len(&self) -> usize {
        self.max_chain_len
    }

    /// Index path used for the data file at `data_path`.
    #[must_use]
    pub fn resolve_index_path(&self, data_path: &Path) -> PathBuf {
        self.index_path
            .clone()
            .unwrap_or_else(|| data_path.with_extension("idx"))
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// State released by [`Table::close`].
#[derive(Debug)]
struct OpenTable<R> {
    reader: R,
    index: Index,
    schema: Schema,
}

/// An open, read-only NDE table.
///
/// Every accessor fails with [`NdeError::Closed`] once [`Table::close`] has
/// been called. Dropping the table releases the file handle as well.
#[derive(Debug)]
pub struct Table<R = BufReader<File>> {
    open: Option<OpenTable<R>>,
    max_chain_len: usize,
}

impl Table<BufReader<File>> {
    /// Open the table at `path`, reading the index from `path` with its
    /// extension replaced by `idx`.
    ///
    /// # Errors
    ///
    /// See [`Table::open_with`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &TableOptions::default())
    }

    /// Open the table at `path` with its index at `index_path`.
    ///
    /// # Errors
    ///
    /// See [`Table::open_with`].
    pub fn open_with_index(path: impl AsRef<Path>, index_path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with(path, &TableOptions::default().with_index_path(index_path))
    }

    /// Open the table at `path` using `options`.
    ///
    /// # Errors
    ///
    /// - `NdeError::Io` if either file cannot be opened or read
    /// - [`FormatError::NotATable`] if the data file lacks the `NDETABLE`
    ///   signature; reported before the index is looked at
    /// - any error from loading the index or decoding the column record
    pub fn open_with(path: impl AsRef<Path>, options: &TableOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        check_signature(&mut reader)?;

        let index_path = options.resolve_index_path(path);
        let index = Index::load(&index_path)?;
        tracing::debug!(
            path = %path.display(),
            index = %index_path.display(),
            records = index.record_count(),
            "opening table"
        );
        Self::build(reader, index, options.max_chain_len)
    }
}

impl<R: Read + Seek> Table<R> {
    /// Open a table over arbitrary streams, such as in-memory buffers.
    ///
    /// `data` is read from its start regardless of its current position.
    ///
    /// # Errors
    ///
    /// As [`Table::open_with`]; `options.index_path` is ignored.
    pub fn from_readers<I: Read>(mut data: R, index: I, options: &TableOptions) -> Result<Self> {
        seek_to(&mut data, 0)?;
        check_signature(&mut data)?;
        let index = Index::from_reader(index)?;
        Self::build(data, index, options.max_chain_len)
    }

    fn build(mut reader: R, index: Index, max_chain_len: usize) -> Result<Self> {
        let start = index.offset(COLUMN_POSITION)?;
        let columns = Record::materialize(&mut reader, start, None, max_chain_len)?;
        let schema = Schema::from_column_record(&columns)?;
        let open = OpenTable {
            reader,
            index,
            schema,
        };
        Ok(Self {
            open: Some(open),
            max_chain_len,
        })
    }

    /// Number of data rows: index entries minus the two reserved positions.
    ///
    /// # Errors
    ///
    /// Returns [`NdeError::Closed`] after [`Table::close`].
    pub fn record_count(&self) -> Result<usize> {
        Ok(self.state()?.index.record_count())
    }

    /// The loaded index.
    ///
    /// # Errors
    ///
    /// Returns [`NdeError::Closed`] after [`Table::close`].
    pub fn index(&self) -> Result<&Index> {
        Ok(&self.state()?.index)
    }

    /// The schema built from the column record.
    ///
    /// # Errors
    ///
    /// Returns [`NdeError::Closed`] after [`Table::close`].
    pub fn schema(&self) -> Result<&Schema> {
        Ok(&self.state()?.schema)
    }

    /// Decode the record at logical `position`.
    ///
    /// # Errors
    ///
    /// - [`NdeError::Closed`] after [`Table::close`]
    /// - [`NdeError::OutOfRange`] if `position` is past the last index entry
    /// - any error from following the record's field chain
    pub fn record(&mut self, position: usize) -> Result<Record<'_>> {
        let max_chain_len = self.max_chain_len;
        let OpenTable {
            reader,
            index,
            schema,
        } = self.state_mut()?;
        let start = index.offset(position)?;
        Record::materialize(reader, start, Some(&*schema), max_chain_len)
    }

    /// A fresh sequence over the data rows, starting at position 2.
    ///
    /// # Errors
    ///
    /// Returns [`NdeError::Closed`] after [`Table::close`].
    pub fn records(&mut self) -> Result<Records<'_, R>> {
        let max_chain_len = self.max_chain_len;
        let OpenTable {
            reader,
            index,
            schema,
        } = self.state_mut()?;
        Ok(Records::new(reader, &*index, &*schema, max_chain_len))
    }

    /// Release the data stream and the index. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.open.take().is_some() {
            tracing::debug!("closed table");
        }
    }

    /// `true` once [`Table::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.open.is_none()
    }

    /// Maximum number of fields followed per record.
    #[must_use]
    pub fn max_chain_len(&self) -> usize {
        self.max_chain_len
    }

    fn state(&self) -> Result<&OpenTable<R>> {
        self.open.as_ref().ok_or(NdeError::Closed)
    }

    fn state_mut(&mut self) -> Result<&mut OpenTable<R>> {
        self.open.as_mut().ok_or(NdeError::Closed)
    }
}

fn check_signature<R: Read>(reader: &mut R) -> Result<()> {
    if signature_matches(reader, TABLE_SIGNATURE)? {
        Ok(())
    } else {
        Err(FormatError::NotATable.into())
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
    use crate::schema::MetadataField;
    use nde_testing::{FixtureField, LibraryFixture, Next};
    use std::io::Cursor;

    fn library() -> LibraryFixture {
        LibraryFixture::new()
            .columns(&[(0, "filename"), (1, "title"), (7, "artist")])
            .row(vec![
                FixtureField::filename(0, r"C:\jazz\so_what.mp3"),
                FixtureField::string(1, "So What"),
                FixtureField::string(7, "Miles Davis"),
            ])
            .row(vec![FixtureField::string(1, "Untitled")])
    }

    fn in_memory(fixture: LibraryFixture) -> Result<Table<Cursor<Vec<u8>>>> {
        let built = fixture.build();
        Table::from_readers(
            Cursor::new(built.table),
            Cursor::new(built.index),
            &TableOptions::default(),
        )
    }

    #[test]
    fn options_default_index_path_swaps_extension() {
        let opts = TableOptions::default();
        assert_eq!(opts.max_chain_len(), DEFAULT_MAX_CHAIN_LEN);
        assert_eq!(
            opts.resolve_index_path(Path::new("/lib/main.dat")),
            PathBuf::from("/lib/main.idx")
        );
    }

    #[test]
    fn options_explicit_index_path_wins() {
        let opts = TableOptions::new().with_index_path("/elsewhere/other.idx");
        assert_eq!(
            opts.resolve_index_path(Path::new("/lib/main.dat")),
            PathBuf::from("/elsewhere/other.idx")
        );
    }

    #[test]
    fn from_readers_loads_schema_and_count() {
        let table = in_memory(library()).unwrap();
        assert_eq!(table.record_count().unwrap(), 2);
        let schema = table.schema().unwrap();
        assert_eq!(schema.get(MetadataField::Artist), Some(7));
        assert_eq!(schema.get(MetadataField::Filename), Some(0));
    }

    #[test]
    fn record_resolves_names_through_table_schema() {
        let mut table = in_memory(library()).unwrap();
        let record = table.record(2).unwrap();
        assert_eq!(record.get_str(MetadataField::Artist), Some("Miles Davis"));
        assert_eq!(
            record.get_str(MetadataField::Filename),
            Some(r"C:\jazz\so_what.mp3")
        );
    }

    #[test]
    fn record_past_last_entry_is_out_of_range() {
        let mut table = in_memory(library()).unwrap();
        let Err(NdeError::OutOfRange { position, len }) = table.record(4) else {
            panic!("expected an out-of-range error");
        };
        assert_eq!((position, len), (4, 4));
    }

    #[test]
    fn reserved_position_is_an_empty_record() {
        let mut table = in_memory(library()).unwrap();
        assert!(table.record(1).unwrap().is_empty());
    }

    #[test]
    fn from_readers_rewinds_the_data_stream() {
        let built = library().build();
        let mut data = Cursor::new(built.table);
        data.set_position(5);
        let index = Cursor::new(built.index);
        let options = TableOptions::default();
        let table = Table::from_readers(data, index, &options).unwrap();
        assert_eq!(table.record_count().unwrap(), 2);
    }

    #[test]
    fn bad_signature_fails_before_index_is_read() {
        // the index stream is garbage too; the table signature must be reported
        let err = Table::from_readers(
            Cursor::new(b"NOTATABLE".to_vec()),
            Cursor::new(Vec::new()),
            &TableOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, NdeError::Format(FormatError::NotATable)));
    }

    #[test]
    fn non_column_in_schema_record_fails_open() {
        let err = in_memory(
            LibraryFixture::new()
                .column(1, "title")
                .column_field(FixtureField::integer(2, 3)),
        )
        .unwrap_err();
        let kind = err.as_format().map(FormatError::kind);
        assert_eq!(kind, Some("not_a_column"));
    }

    #[test]
    fn runaway_schema_chain_honours_configured_limit() {
        let looping = FixtureField::column(2, "artist");
        let built = LibraryFixture::new()
            .column(1, "title")
            .column_field(looping.with_next(Next::RecordStart))
            .build();
        let err = Table::from_readers(
            Cursor::new(built.table),
            Cursor::new(built.index),
            &TableOptions::new().with_max_chain_len(8),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            NdeError::Format(FormatError::ChainTooLong { limit: 8, .. })
        ));
    }

    #[test]
    fn close_is_idempotent_and_fails_later_calls() {
        let mut table = in_memory(library()).unwrap();
        assert!(!table.is_closed());
        table.close();
        table.close();
        assert!(table.is_closed());
        assert!(matches!(table.record_count(), Err(NdeError::Closed)));
        assert!(matches!(table.schema(), Err(NdeError::Closed)));
        assert!(matches!(table.index(), Err(NdeError::Closed)));
        assert!(matches!(table.record(2), Err(NdeError::Closed)));
        assert!(matches!(table.records(), Err(NdeError::Closed)));
    }

    #[test]
    fn open_uses_sibling_idx_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (dat, _) = library().build().write_to(tmp.path(), "main").unwrap();
        let table = Table::open(&dat).unwrap();
        assert_eq!(table.record_count().unwrap(), 2);
    }

    #[test]
    fn open_with_index_overrides_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let built = library().build();
        let (dat, idx) = built.write_to(tmp.path(), "main").unwrap();
        let moved = tmp.path().join("elsewhere.idx");
        std::fs::rename(&idx, &moved).unwrap();

        assert!(matches!(Table::open(&dat), Err(NdeError::Io(_))));
        let table = Table::open_with_index(&dat, &moved).unwrap();
        assert_eq!(table.index().unwrap().len(), 4);
    }

    #[test]
    fn zero_length_data_file_is_not_a_table_even_without_index() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dat = tmp.path().join("main.dat");
        std::fs::write(&dat, b"").unwrap();
        let err = Table::open(&dat).unwrap_err();
        assert!(matches!(err, NdeError::Format(FormatError::NotATable)));
    }
}
