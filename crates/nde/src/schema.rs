//! Schema — logical metadata names mapped to the field ids of one table.
//!
//! Built once from the column record at index position 0. Each column
//! definition names a logical field (`"artist"`, `"playcount"`, ...) and
//! carries the id every data row uses for that field. Which names appear
//! varies by Winamp version; an unrecognised name is skipped, and a name the
//! schema lacks simply resolves to `None`.

use std::fmt;
use std::str::FromStr;

use heapless::LinearMap;
use serde::Serialize;

use crate::error::{FormatError, Result};
use crate::field::FieldValue;
use crate::record::Record;

// ---------------------------------------------------------------------------
// MetadataField
// ---------------------------------------------------------------------------

macro_rules! metadata_fields {
    ($($(#[$doc:meta])* $variant:ident => $column:literal,)+) => {
        /// Logical metadata fields a Winamp library can define.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum MetadataField {
            $($(#[$doc])* $variant,)+
        }

        impl MetadataField {
            /// Every known field, in declaration order.
            pub const ALL: &'static [MetadataField] = &[$(MetadataField::$variant,)+];

            /// Column name as written in the column record.
            #[must_use]
            pub const fn column_name(self) -> &'static str {
                match self {
                    $(MetadataField::$variant => $column,)+
                }
            }
        }
    };
}

metadata_fields! {
    /// Album title.
    Album => "album",
    /// Album artist, for compilations.
    AlbumArtist => "albumartist",
    /// Performing artist.
    Artist => "artist",
    /// Bitrate in kbit/s.
    Bitrate => "bitrate",
    /// Beats per minute.
    Bpm => "bpm",
    /// Category label.
    Category => "category",
    /// Codec name.
    Codec => "codec",
    /// Free-form comment.
    Comment => "comment",
    /// Composer.
    Composer => "composer",
    /// When the file was added to the library.
    DateAdded => "dateadded",
    /// Disc number.
    Disc => "disc",
    /// Disc count.
    Discs => "discs",
    /// Full path of the media file.
    Filename => "filename",
    /// File size.
    Filesize => "filesize",
    /// File modification time.
    FileTime => "filetime",
    /// Genre.
    Genre => "genre",
    /// Last time the track was played.
    LastPlay => "lastplay",
    /// Last time the library entry was updated.
    LastUpd => "lastupd",
    /// Duration.
    Length => "length",
    /// Lossless flag.
    Lossless => "lossless",
    /// Play count.
    PlayCount => "playcount",
    /// Producer.
    Producer => "producer",
    /// Publisher or label.
    Publisher => "publisher",
    /// User rating.
    Rating => "rating",
    /// ReplayGain album gain.
    ReplayGainAlbumGain => "replaygain_album_gain",
    /// ReplayGain track gain.
    ReplayGainTrackGain => "replaygain_track_gain",
    /// Track title.
    Title => "title",
    /// Track number.
    TrackNo => "trackno",
    /// Track count on the album.
    Tracks => "tracks",
    /// Media type.
    Type => "type",
    /// Release year.
    Year => "year",
}

/// Number of [`MetadataField`] variants; the schema's fixed capacity.
pub const FIELD_COUNT: usize = MetadataField::ALL.len();

/// A column name that is not a known [`MetadataField`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown metadata field `{}`", self.0)
    }
}

impl std::error::Error for UnknownField {}

impl FromStr for MetadataField {
    type Err = UnknownField;

    /// ASCII case-insensitive match against [`MetadataField::column_name`].
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.column_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownField(s.to_owned()))
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Mapping from logical field to the numeric field id used by one table.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    ids: LinearMap<MetadataField, u8, FIELD_COUNT>,
}

impl Schema {
    /// A schema with no mappings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the schema from the column record.
    ///
    /// Column names that are not a known [`MetadataField`] are skipped. When
    /// two columns name the same field, the first one wins.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::NotAColumn`] if any field of `columns` is not a
    /// column definition.
    pub fn from_column_record(columns: &Record<'_>) -> Result<Self> {
        let mut schema = Self::new();
        for field in columns.fields() {
            let FieldValue::Column(def) = field.value() else {
                return Err(FormatError::NotAColumn {
                    field_type: field.field_type(),
                    offset: field.offset(),
                }
                .into());
            };
            match def.name.parse::<MetadataField>() {
                Ok(name) => schema.insert(name, field.id()),
                Err(_) => {
                    tracing::debug!(
                        column = %def.name,
                        id = field.id(),
                        "skipping unrecognised column"
                    );
                }
            }
        }
        tracing::debug!(
            mapped = schema.len(),
            columns = columns.len(),
            "built schema"
        );
        Ok(schema)
    }

    /// Map `name` to `id` unless `name` is already mapped.
    pub fn insert(&mut self, name: MetadataField, id: u8) {
        if self.ids.contains_key(&name) {
            tracing::debug!(%name, id, "duplicate column definition ignored");
            return;
        }
        // Capacity equals the number of MetadataField variants, so a new key always fits.
        if self.ids.insert(name, id).is_err() {
            tracing::debug!(%name, id, "schema full, column ignored");
        }
    }

    /// Field id for `name`, or `None` if this table does not define it.
    #[must_use]
    pub fn get(&self, name: MetadataField) -> Option<u8> {
        self.ids.get(&name).copied()
    }

    /// `true` if `name` is mapped.
    #[must_use]
    pub fn contains(&self, name: MetadataField) -> bool {
        self.ids.contains_key(&name)
    }

    /// Number of mapped fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// `true` when nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `(name, id)` pairs in column-record order.
    pub fn iter(&self) -> impl Iterator<Item = (MetadataField, u8)> + '_ {
        self.ids.iter().map(|(name, id)| (*name, *id))
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
    use crate::field::FieldType;
    use crate::record::{Record, DEFAULT_MAX_CHAIN_LEN};
    use nde_testing::{FixtureField, LibraryFixture};
    use std::io::Cursor;

    fn schema_from(fixture: LibraryFixture) -> Result<Schema> {
        let built = fixture.build();
        let mut cur = Cursor::new(built.table);
        let start = built.record_offsets[0];
        let record = Record::materialize(&mut cur, start, None, DEFAULT_MAX_CHAIN_LEN)?;
        Schema::from_column_record(&record)
    }

    fn schema_with(columns: &[(u8, &str)]) -> Schema {
        schema_from(LibraryFixture::new().columns(columns)).unwrap()
    }

    fn parse(name: &str) -> std::result::Result<MetadataField, UnknownField> {
        name.parse()
    }

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!(parse("Artist"), Ok(MetadataField::Artist));
        assert_eq!(parse("PLAYCOUNT"), Ok(MetadataField::PlayCount));
        assert_eq!(parse("albumArtist"), Ok(MetadataField::AlbumArtist));
        assert_eq!(
            parse("ReplayGain_Track_Gain"),
            Ok(MetadataField::ReplayGainTrackGain)
        );
    }

    #[test]
    fn unknown_name_fails_to_parse() {
        assert_eq!(
            parse("gracenotefileid"),
            Err(UnknownField("gracenotefileid".to_owned()))
        );
        assert!(parse("").is_err());
    }

    #[test]
    fn column_names_round_trip_through_parse() {
        for field in MetadataField::ALL {
            assert_eq!(parse(field.column_name()), Ok(*field));
        }
    }

    #[test]
    fn builds_mapping_from_column_record() {
        let columns = [(0, "filename"), (7, "artist"), (12, "rating")];
        let schema = schema_with(&columns);
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.get(MetadataField::Artist), Some(7));
        assert_eq!(schema.get(MetadataField::Filename), Some(0));
        assert_eq!(schema.get(MetadataField::Rating), Some(12));
        assert_eq!(schema.get(MetadataField::Title), None);
    }

    #[test]
    fn unrecognised_columns_are_skipped() {
        let columns = [(1, "title"), (40, "GracenoteExtData"), (2, "Artist")];
        let schema = schema_with(&columns);
        assert_eq!(schema.len(), 2);
        assert!(schema.contains(MetadataField::Title));
        assert!(schema.contains(MetadataField::Artist));
    }

    #[test]
    fn first_duplicate_column_wins() {
        let columns = [(3, "artist"), (9, "ARTIST")];
        let schema = schema_with(&columns);
        assert_eq!(schema.get(MetadataField::Artist), Some(3));
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn non_column_field_is_rejected() {
        let err = schema_from(
            LibraryFixture::new()
                .column(1, "title")
                .column_field(FixtureField::string(2, "not a column")),
        )
        .unwrap_err();
        let Some(FormatError::NotAColumn { field_type, .. }) = err.as_format() else {
            panic!("expected a non-column error, got {err}");
        };
        assert_eq!(*field_type, FieldType::String);
    }

    #[test]
    fn empty_column_record_gives_empty_schema() {
        let schema = schema_from(LibraryFixture::new()).unwrap();
        assert!(schema.is_empty());
    }

    #[test]
    fn iter_preserves_column_order() {
        let columns = [(5, "year"), (1, "album")];
        let schema = schema_with(&columns);
        let pairs: Vec<_> = schema.iter().collect();
        let expected = vec![(MetadataField::Year, 5), (MetadataField::Album, 1)];
        assert_eq!(pairs, expected);
    }
}
