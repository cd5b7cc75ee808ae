//! Error types for NDE table, index and record decoding.
//!
//! ## Error Handling Strategy
//!
//! - **Corruption**: [`NdeError::Format`]. The bytes do not match the NDE
//!   layout; the table, index or record being decoded cannot be trusted.
//! - **Caller errors**: [`NdeError::OutOfRange`], [`NdeError::Closed`].
//! - **Environment**: [`NdeError::Io`].
//!
//! A logical field missing from the schema or from a record is *not* an
//! error; lookups return `None` for it.

use thiserror::Error;

use crate::field::FieldType;

/// Convenience type alias for `Result<T, NdeError>`.
pub type Result<T> = std::result::Result<T, NdeError>;

/// Any failure while opening or reading an NDE table.
#[derive(Debug, Error)]
pub enum NdeError {
    /// I/O error from the underlying file or stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input does not match the NDE binary layout.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Index lookup past the last entry.
    #[error("index position {position} out of range (index holds {len} entries)")]
    OutOfRange {
        /// Requested logical position.
        position: usize,
        /// Number of entries in the index.
        len: usize,
    },

    /// The table was closed; no further reads are possible.
    #[error("table has been closed")]
    Closed,
}

/// Ways an NDE file can fail to match the expected layout.
///
/// Offsets are absolute byte positions in the file being decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Table file does not start with `NDETABLE`.
    #[error("not a valid media library database (missing NDETABLE signature)")]
    NotATable,

    /// Index file does not start with `NDEINDEX`.
    #[error("not a valid media library index (missing NDEINDEX signature)")]
    NotAnIndex,

    /// Index header declares a negative entry count.
    #[error("index declares a negative entry count ({0})")]
    NegativeEntryCount(i32),

    /// Field type tag outside the known set.
    #[error("unknown field type tag {tag} at offset {offset}")]
    UnknownFieldType {
        /// Raw tag byte.
        tag: u8,
        /// Offset of the field header.
        offset: u64,
    },

    /// Known field type that this reader cannot interpret.
    #[error("unsupported field type {field_type} at offset {offset}")]
    UnsupportedFieldType {
        /// Decoded tag.
        field_type: FieldType,
        /// Offset of the field header.
        offset: u64,
    },

    /// Integer-valued field whose declared width is not 4 bytes.
    #[error("integer field at offset {offset} declares {size} bytes, expected 4")]
    IntegerWidth {
        /// Declared `max size on disk`.
        size: i32,
        /// Offset of the field header.
        offset: u64,
    },

    /// String field with a negative length prefix.
    #[error("string field at offset {offset} has negative length {len}")]
    NegativeLength {
        /// Raw length prefix.
        len: i16,
        /// Offset of the field header.
        offset: u64,
    },

    /// String payload too short to hold the 2-byte byte-order mark.
    #[error("string field at offset {offset} is {len} bytes, too short for a byte-order mark")]
    MissingBom {
        /// Declared payload length.
        len: usize,
        /// Offset of the field header.
        offset: u64,
    },

    /// Fewer bytes available than the structure declares.
    #[error("truncated data at offset {offset}")]
    Truncated {
        /// Offset of the structure being read.
        offset: u64,
    },

    /// Field chain did not terminate within the configured number of hops.
    #[error("record at offset {start} exceeds {limit} chained fields")]
    ChainTooLong {
        /// Start offset of the record.
        start: u64,
        /// Configured maximum chain length.
        limit: usize,
    },

    /// Column record contains something other than a column definition.
    #[error("column record holds a {field_type} field at offset {offset}")]
    NotAColumn {
        /// Type of the offending field.
        field_type: FieldType,
        /// Offset of the offending field.
        offset: u64,
    },

    /// Datetime payload cannot be represented.
    #[error("timestamp {secs} at offset {offset} is out of range")]
    TimestampOutOfRange {
        /// Raw seconds since the epoch.
        secs: i32,
        /// Offset of the field header.
        offset: u64,
    },
}

impl FormatError {
    /// Short machine-friendly name of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotATable => "not_a_table",
            Self::NotAnIndex => "not_an_index",
            Self::NegativeEntryCount(_) => "negative_entry_count",
            Self::UnknownFieldType { .. } => "unknown_field_type",
            Self::UnsupportedFieldType { .. } => "unsupported_field_type",
            Self::IntegerWidth { .. } => "integer_width",
            Self::NegativeLength { .. } => "negative_length",
            Self::MissingBom { .. } => "missing_bom",
            Self::Truncated { .. } => "truncated",
            Self::ChainTooLong { .. } => "chain_too_long",
            Self::NotAColumn { .. } => "not_a_column",
            Self::TimestampOutOfRange { .. } => "timestamp_out_of_range",
        }
    }
}

impl NdeError {
    /// The format error carried by this error, if any.
    #[must_use]
    pub fn as_format(&self) -> Option<&FormatError> {
        match self {
            Self::Format(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn table_signature_message_names_the_database() {
        let err = NdeError::from(FormatError::NotATable);
        assert_eq!(
            err.to_string(),
            "not a valid media library database (missing NDETABLE signature)"
        );
    }

    #[test]
    fn as_format_only_matches_format_errors() {
        let err = NdeError::from(FormatError::Truncated { offset: 8 });
        assert_eq!(err.as_format().map(FormatError::kind), Some("truncated"));
        assert!(NdeError::Closed.as_format().is_none());
    }

    #[test]
    fn out_of_range_reports_position_and_len() {
        let err = NdeError::OutOfRange {
            position: 9,
            len: 5,
        };
        assert_eq!(
            err.to_string(),
            "index position 9 out of range (index holds 5 entries)"
        );
    }
}
