//! End-to-end tests: fixture bytes → disk → `Table::open` → `Records` → `Track`.
//!
//! No mocks. Uses tempfiles. Exercises the same path a migration run takes
//! over a real `main.dat`/`main.idx` pair.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

use nde::{FormatError, MetadataField, NdeError, Table, TableOptions, Track};
use nde_testing::{FixtureField, LibraryFixture};
use tempfile::TempDir;

// (title, artist, album, rating, playcount)
fn three_track_library() -> LibraryFixture {
    let rows = [
        ("So What", "Miles Davis", "Kind of Blue", Some(5), Some(12)),
        ("All Blues", "Miles Davis", "Kind of Blue", None, Some(3)),
        ("Naima", "John Coltrane", "Giant Steps", Some(4), None),
    ];
    let mut fixture = LibraryFixture::new()
        .columns(&[
            (0, "filename"),
            (1, "title"),
            (2, "artist"),
            (3, "album"),
            (11, "rating"),
            (15, "playcount"),
            (60, "cloud"),
        ])
        .index_id(3);
    for (n, (title, artist, album, rating, plays)) in rows.into_iter().enumerate() {
        let mut fields = vec![
            FixtureField::filename(0, &format!(r"C:\music\{n:02}.mp3")),
            FixtureField::string(1, title),
            FixtureField::string(2, artist),
            FixtureField::string(3, album),
        ];
        if let Some(r) = rating {
            fields.push(FixtureField::integer(11, r));
        }
        if let Some(p) = plays {
            fields.push(FixtureField::integer(15, p));
        }
        fixture = fixture.row(fields);
    }
    fixture
}

fn open_on_disk(fixture: &LibraryFixture) -> (TempDir, Table) {
    let tmp = TempDir::new().unwrap();
    let (dat, _) = fixture.build().write_to(tmp.path(), "main").unwrap();
    let table = Table::open(&dat).unwrap();
    (tmp, table)
}

// ---------------------------------------------------------------------------
// E2E Tests
// ---------------------------------------------------------------------------

#[test]
fn e2e_five_entries_three_rows() {
    let (_tmp, mut table) = open_on_disk(&three_track_library());
    assert_eq!(table.index().unwrap().len(), 5);
    assert_eq!(table.index().unwrap().id(), 3);
    assert_eq!(table.record_count().unwrap(), 3);

    let records: Vec<_> = table.records().unwrap().collect();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(Result::is_ok));
}

#[test]
fn e2e_tracks_come_back_in_index_order() {
    let (_tmp, mut table) = open_on_disk(&three_track_library());
    let tracks: Vec<Track> = table
        .records()
        .unwrap()
        .map(|r| Track::from_record(&r.unwrap()))
        .collect();

    assert_eq!(tracks[0].title.as_deref(), Some("So What"));
    assert_eq!(tracks[0].rating, Some(5));
    assert_eq!(tracks[0].play_count, 12);
    assert_eq!(tracks[1].title.as_deref(), Some("All Blues"));
    assert_eq!(tracks[1].rating, None);
    assert_eq!(tracks[2].artist.as_deref(), Some("John Coltrane"));
    assert_eq!(tracks[2].play_count, 0);
    assert_eq!(tracks[2].filename.as_deref(), Some(r"C:\music\02.mp3"));
}

#[test]
fn e2e_schema_round_trip_artist_seven() {
    let fixture = LibraryFixture::new()
        .column(7, "Artist")
        .row(vec![FixtureField::string(7, "Miles Davis")])
        .row(vec![FixtureField::string(8, "someone else")]);
    let (_tmp, mut table) = open_on_disk(&fixture);

    let mut records = table.records().unwrap();
    let first = records.next().unwrap().unwrap();
    assert_eq!(first.get_str(MetadataField::Artist), Some("Miles Davis"));
    let second = records.next().unwrap().unwrap();
    assert!(second.get_by_name(MetadataField::Artist).is_none());
}

#[test]
fn e2e_unknown_columns_do_not_block_open() {
    let (_tmp, table) = open_on_disk(&three_track_library());
    let schema = table.schema().unwrap();
    assert_eq!(schema.len(), 6);
    assert!(!schema.contains(MetadataField::Genre));
}

#[test]
fn e2e_zero_length_dat_is_not_a_table() {
    let tmp = TempDir::new().unwrap();
    let dat = tmp.path().join("main.dat");
    std::fs::write(&dat, b"").unwrap();
    // no index file at all: the signature check must fail first
    let err = Table::open(&dat).unwrap_err();
    assert!(matches!(err, NdeError::Format(FormatError::NotATable)));
}

#[test]
fn e2e_index_file_with_table_signature_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let built = three_track_library().build();
    let (dat, idx) = built.write_to(tmp.path(), "main").unwrap();
    std::fs::copy(&dat, &idx).unwrap();
    let err = Table::open(&dat).unwrap_err();
    assert!(matches!(err, NdeError::Format(FormatError::NotAnIndex)));
}

#[test]
fn e2e_explicit_index_path() {
    let tmp = TempDir::new().unwrap();
    let built = three_track_library().build();
    let dat = tmp.path().join("library.dat");
    let idx = tmp.path().join("library-index.bin");
    std::fs::write(&dat, &built.table).unwrap();
    std::fs::write(&idx, &built.index).unwrap();

    let options = TableOptions::new().with_index_path(&idx);
    let table = Table::open_with(&dat, &options).unwrap();
    assert_eq!(table.record_count().unwrap(), 3);
}

#[test]
fn e2e_close_releases_and_is_idempotent() {
    let (_tmp, mut table) = open_on_disk(&three_track_library());
    table.close();
    table.close();
    assert!(matches!(table.records(), Err(NdeError::Closed)));
}

#[test]
fn e2e_large_library_all_rows_readable() {
    // 500 rows: catches offset drift between index and table
    let columns = [(1, "title"), (2, "trackno")];
    let mut fixture = LibraryFixture::new().columns(&columns);
    for n in 0..500 {
        fixture = fixture.row(vec![
            FixtureField::string(1, &format!("Track {n:03}")),
            FixtureField::integer(2, n),
        ]);
    }
    let (_tmp, mut table) = open_on_disk(&fixture);
    assert_eq!(table.record_count().unwrap(), 500);

    let last = table.records().unwrap().last().unwrap().unwrap();
    assert_eq!(last.get_str(MetadataField::Title), Some("Track 499"));
    assert_eq!(last.get_i32(MetadataField::TrackNo), Some(499));
}
