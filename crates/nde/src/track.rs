//! Track — typed view over the metadata a library row usually carries.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::record::Record;
use crate::schema::MetadataField;

/// The commonly used metadata of one library row.
///
/// Built with [`Track::from_record`]. A column the table does not define, a
/// row without that field, and a field holding an unexpected type all come
/// out as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Track {
    /// Full path of the media file.
    pub filename: Option<String>,
    /// Display title.
    pub title: Option<String>,
    /// Performing artist.
    pub artist: Option<String>,
    /// Album title.
    pub album: Option<String>,
    /// Album artist.
    pub album_artist: Option<String>,
    /// Genre.
    pub genre: Option<String>,
    /// User rating.
    pub rating: Option<i32>,
    /// Times played; 0 when the row does not record it.
    pub play_count: i32,
    /// Release year.
    pub year: Option<i32>,
    /// Track number on the album.
    pub track_no: Option<i32>,
    /// Duration.
    pub length: Option<i32>,
    /// Last time the track was played.
    pub last_play: Option<NaiveDateTime>,
}

impl Track {
    /// Extract the track metadata of `record`.
    #[must_use]
    pub fn from_record(record: &Record<'_>) -> Self {
        let text = |name| record.get_str(name).map(str::to_owned);
        Self {
            filename: text(MetadataField::Filename),
            title: text(MetadataField::Title),
            artist: text(MetadataField::Artist),
            album: text(MetadataField::Album),
            album_artist: text(MetadataField::AlbumArtist),
            genre: text(MetadataField::Genre),
            rating: record.get_i32(MetadataField::Rating),
            play_count: record.get_i32(MetadataField::PlayCount).unwrap_or(0),
            year: record.get_i32(MetadataField::Year),
            track_no: record.get_i32(MetadataField::TrackNo),
            length: record.get_i32(MetadataField::Length),
            last_play: record.get_datetime(MetadataField::LastPlay),
        }
    }
}

impl From<&Record<'_>> for Track {
    fn from(record: &Record<'_>) -> Self {
        Self::from_record(record)
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
    use crate::table::{Table, TableOptions};
    use nde_testing::{FixtureField, LibraryFixture};
    use std::io::Cursor;

    fn first_track(fixture: LibraryFixture) -> Track {
        let built = fixture.build();
        let mut table = Table::from_readers(
            Cursor::new(built.table),
            Cursor::new(built.index),
            &TableOptions::default(),
        )
        .unwrap();
        let record = table.record(2).unwrap();
        Track::from_record(&record)
    }

    fn full_columns() -> LibraryFixture {
        LibraryFixture::new().columns(&[
            (0, "filename"),
            (1, "title"),
            (2, "artist"),
            (3, "album"),
            (4, "year"),
            (5, "genre"),
            (7, "trackno"),
            (8, "length"),
            (9, "type"),
            (10, "lastplay"),
            (11, "rating"),
            (15, "playcount"),
            (27, "albumartist"),
        ])
    }

    #[test]
    fn extracts_every_mapped_field() {
        let track = first_track(full_columns().row(vec![
            FixtureField::filename(0, r"C:\jazz\kind_of_blue\01.mp3"),
            FixtureField::string(1, "So What"),
            FixtureField::string(2, "Miles Davis"),
            FixtureField::string(3, "Kind of Blue"),
            FixtureField::integer(4, 1959),
            FixtureField::string(5, "Jazz"),
            FixtureField::integer(7, 1),
            FixtureField::length(8, 562),
            FixtureField::integer(9, 0),
            FixtureField::datetime(10, 1_000_000_000),
            FixtureField::integer(11, 5),
            FixtureField::integer(15, 42),
            FixtureField::string(27, "Miles Davis"),
        ]));
        assert_eq!(
            track.filename.as_deref(),
            Some(r"C:\jazz\kind_of_blue\01.mp3")
        );
        assert_eq!(track.title.as_deref(), Some("So What"));
        assert_eq!(track.artist.as_deref(), Some("Miles Davis"));
        assert_eq!(track.album.as_deref(), Some("Kind of Blue"));
        assert_eq!(track.album_artist.as_deref(), Some("Miles Davis"));
        assert_eq!(track.genre.as_deref(), Some("Jazz"));
        assert_eq!(track.year, Some(1959));
        assert_eq!(track.track_no, Some(1));
        assert_eq!(track.length, Some(562));
        assert_eq!(track.rating, Some(5));
        assert_eq!(track.play_count, 42);
        assert_eq!(
            track.last_play.map(|t| t.to_string()).as_deref(),
            Some("2001-09-09 01:46:40")
        );
    }

    #[test]
    fn missing_fields_are_none_and_play_count_defaults_to_zero() {
        let track = first_track(full_columns().row(vec![FixtureField::string(1, "Lonely")]));
        assert_eq!(track.title.as_deref(), Some("Lonely"));
        let expected = Track {
            title: Some("Lonely".to_owned()),
            ..Track::default()
        };
        assert_eq!(track, expected);
    }

    #[test]
    fn unexpected_variant_is_treated_as_absent() {
        let track = first_track(full_columns().row(vec![
            FixtureField::string(11, "five stars"),
            FixtureField::integer(1, 3),
        ]));
        assert_eq!(track.rating, None);
        assert_eq!(track.title, None);
    }

    #[test]
    fn serializes_to_json() {
        let track = Track {
            title: Some("Blue in Green".to_owned()),
            play_count: 3,
            ..Track::default()
        };
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["title"], "Blue in Green");
        assert_eq!(json["play_count"], 3);
        assert!(json["rating"].is_null());
    }
}
