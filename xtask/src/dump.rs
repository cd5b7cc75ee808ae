//! xtask dump — print the tracks of a library database.
//!
//! Block format, one per track:
//!
//! ```text
//! BEGIN TRACK
//! File: C:\Music\01.mp3
//! Title: So What
//! Artist: Miles Davis
//! Album: Kind of Blue
//! Rating: -1
//! Playcount: 0
//! ```
//!
//! Missing text prints empty, a missing rating prints `-1`, a missing play
//! count prints `0`.

use std::io::{self, BufWriter, Read, Seek, Write};

use anyhow::{bail, Context, Result};
use nde::{Table, Track};

/// Output layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `BEGIN TRACK` blocks.
    Blocks,
    /// One JSON object per line.
    Json,
}

/// Entry point called from main.rs
pub fn run<R: Read + Seek>(
    table: &mut Table<R>,
    format: Format,
    limit: Option<usize>,
) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let summary = write_dump(table, &mut out, format, limit)?;
    out.flush()?;
    tracing::info!(
        written = summary.written,
        failed = summary.failed,
        "dump finished"
    );
    if summary.failed > 0 {
        let total = summary.written.saturating_add(summary.failed);
        bail!("{} of {} records failed to decode", summary.failed, total);
    }
    Ok(())
}

/// Counts reported by [`write_dump`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub written: usize,
    pub failed: usize,
}

/// Write up to `limit` tracks of `table` to `out`.
///
/// A record that fails to decode is logged and counted, and the dump goes on.
pub(crate) fn write_dump<R: Read + Seek, W: Write>(
    table: &mut Table<R>,
    out: &mut W,
    format: Format,
    limit: Option<usize>,
) -> Result<Summary> {
    let mut summary = Summary::default();
    let records = table.records().context("table is closed")?;
    for (n, record) in records.take(limit.unwrap_or(usize::MAX)).enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(record = n, error = %e, "skipping record");
                summary.failed = summary.failed.saturating_add(1);
                continue;
            }
        };
        let track = Track::from_record(&record);
        match format {
            Format::Blocks => write_block(out, &track)?,
            Format::Json => {
                serde_json::to_writer(&mut *out, &track)?;
                writeln!(out)?;
            }
        }
        summary.written = summary.written.saturating_add(1);
    }
    Ok(summary)
}

fn write_block<W: Write>(out: &mut W, track: &Track) -> io::Result<()> {
    writeln!(out, "BEGIN TRACK")?;
    writeln!(out, "File: {}", track.filename.as_deref().unwrap_or(""))?;
    writeln!(out, "Title: {}", track.title.as_deref().unwrap_or(""))?;
    writeln!(out, "Artist: {}", track.artist.as_deref().unwrap_or(""))?;
    writeln!(out, "Album: {}", track.album.as_deref().unwrap_or(""))?;
    writeln!(out, "Rating: {}", track.rating.unwrap_or(-1))?;
    writeln!(out, "Playcount: {}", track.play_count)
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

    fn open(fixture: LibraryFixture) -> Table<Cursor<Vec<u8>>> {
        let built = fixture.build();
        Table::from_readers(
            Cursor::new(built.table),
            Cursor::new(built.index),
            &TableOptions::default(),
        )
        .unwrap()
    }

    fn library() -> Table<Cursor<Vec<u8>>> {
        let fixture = LibraryFixture::new()
            .columns(&[
                (0, "filename"),
                (1, "title"),
                (2, "artist"),
                (3, "album"),
                (11, "rating"),
                (15, "playcount"),
            ])
            .row(vec![
                FixtureField::filename(0, r"C:\Music\01.mp3"),
                FixtureField::string(1, "So What"),
                FixtureField::string(2, "Miles Davis"),
                FixtureField::string(3, "Kind of Blue"),
                FixtureField::integer(11, 5),
                FixtureField::integer(15, 12),
            ])
            .row(vec![FixtureField::string(1, "Untagged")]);
        open(fixture)
    }

    fn dump_table(table: &mut Table<Cursor<Vec<u8>>>, format: Format) -> (String, Summary) {
        let mut out = Vec::new();
        let summary = write_dump(table, &mut out, format, None).unwrap();
        (String::from_utf8(out).unwrap(), summary)
    }

    fn dump(format: Format, limit: Option<usize>) -> (String, Summary) {
        let mut table = library();
        let mut out = Vec::new();
        let summary = write_dump(&mut table, &mut out, format, limit).unwrap();
        (String::from_utf8(out).unwrap(), summary)
    }

    #[test]
    fn blocks_match_legacy_layout() {
        let (text, summary) = dump(Format::Blocks, None);
        let expected = Summary {
            written: 2,
            failed: 0,
        };
        assert_eq!(summary, expected);
        assert_eq!(
            text,
            "BEGIN TRACK\n\
             File: C:\\Music\\01.mp3\n\
             Title: So What\n\
             Artist: Miles Davis\n\
             Album: Kind of Blue\n\
             Rating: 5\n\
             Playcount: 12\n\
             BEGIN TRACK\n\
             File: \n\
             Title: Untagged\n\
             Artist: \n\
             Album: \n\
             Rating: -1\n\
             Playcount: 0\n"
        );
    }

    #[test]
    fn json_writes_one_object_per_line() {
        let (text, _) = dump(Format::Json, None);
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["artist"], "Miles Davis");
        assert_eq!(lines[1]["play_count"], 0);
        assert!(lines[1]["rating"].is_null());
    }

    #[test]
    fn limit_stops_early() {
        let (text, summary) = dump(Format::Blocks, Some(1));
        assert_eq!(summary.written, 1);
        assert_eq!(text.matches("BEGIN TRACK").count(), 1);
    }

    #[test]
    fn corrupt_record_is_counted_and_skipped() {
        let mut table = open(
            LibraryFixture::new()
                .column(1, "title")
                .row(vec![FixtureField::raw(1, 200, 0, Vec::new())])
                .row(vec![FixtureField::string(1, "fine")]),
        );
        let (text, summary) = dump_table(&mut table, Format::Blocks);
        let expected = Summary {
            written: 1,
            failed: 1,
        };
        assert_eq!(summary, expected);
        assert!(text.contains("Title: fine"));
    }

    #[test]
    fn closed_table_is_an_error() {
        let mut table = library();
        table.close();
        let mut out = Vec::new();
        let result = write_dump(&mut table, &mut out, Format::Blocks, None);
        assert!(result.is_err());
    }
}
