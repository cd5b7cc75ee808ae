//! xtask info — summary of a library database.

use std::io::{self, BufWriter, Read, Seek, Write};

use anyhow::Result;
use colored::Colorize;
use nde::Table;

/// Entry point called from main.rs
pub fn run<R: Read + Seek>(table: &Table<R>, offsets: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_info(table, &mut out, offsets)?;
    out.flush()?;
    Ok(())
}

/// Write the record count, index id and schema; with `offsets`, every raw
/// index entry as well.
pub(crate) fn write_info<R: Read + Seek, W: Write>(
    table: &Table<R>,
    out: &mut W,
    offsets: bool,
) -> Result<()> {
    let index = table.index()?;
    let schema = table.schema()?;

    writeln!(out, "{}", "Table".cyan().bold())?;
    writeln!(out, "  records:     {}", table.record_count()?)?;
    writeln!(out, "  index id:    {}", index.id())?;
    writeln!(out, "  entries:     {}", index.len())?;
    writeln!(out)?;

    let heading = format!("Schema ({} fields)", schema.len());
    writeln!(out, "{}", heading.cyan().bold())?;
    for (name, id) in schema.iter() {
        writeln!(out, "  {:<24} {id}", name.column_name())?;
    }

    if offsets {
        writeln!(out)?;
        writeln!(out, "{}", "Index".cyan().bold())?;
        for (position, entry) in index.entries().iter().enumerate() {
            let (offset, reserved) = (entry.offset, entry.reserved);
            writeln!(out, "  {position:>8}  offset {offset:>10}  {reserved:>10}")?;
        }
    }
    Ok(())
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
    use nde::TableOptions;
    use nde_testing::{FixtureField, LibraryFixture};
    use std::io::Cursor;

    fn open(fixture: &LibraryFixture) -> Table<Cursor<Vec<u8>>> {
        let built = fixture.build();
        Table::from_readers(
            Cursor::new(built.table),
            Cursor::new(built.index),
            &TableOptions::default(),
        )
        .unwrap()
    }

    fn info(offsets: bool) -> String {
        let columns = [(1, "title"), (7, "artist"), (40, "gracenotefileid")];
        let fixture = LibraryFixture::new()
            .columns(&columns)
            .row(vec![FixtureField::string(1, "So What")])
            .index_id(9);
        let table = open(&fixture);
        let mut out = Vec::new();
        write_info(&table, &mut out, offsets).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn reports_counts_and_schema() {
        let text = info(false);
        assert!(text.contains("records:     1"));
        assert!(text.contains("index id:    9"));
        assert!(text.contains("entries:     3"));
        let artist_row = |l: &str| l.trim_start().starts_with("artist") && l.ends_with(" 7");
        assert!(text.lines().any(artist_row));
        assert!(!text.contains("gracenotefileid"));
        assert!(!text.contains("offset"));
    }

    #[test]
    fn offsets_lists_every_entry() {
        let text = info(true);
        assert_eq!(text.lines().filter(|l| l.contains("offset")).count(), 3);
    }

    #[test]
    fn closed_table_is_an_error() {
        let mut table = open(&LibraryFixture::new().column(1, "title"));
        table.close();
        let mut out = Vec::new();
        assert!(write_info(&table, &mut out, false).is_err());
    }
}
