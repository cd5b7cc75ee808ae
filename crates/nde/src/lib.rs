//! Read-only decoder for Winamp media library (NDE) tables.
//!
//! A library is a pair of files: `main.idx` lists the start offset of every
//! record, `main.dat` holds the records as chains of self-describing fields.
//! Record 0 defines the columns; data rows start at index position 2.
//!
//! ```no_run
//! use nde::{MetadataField, Table};
//!
//! let mut table = Table::open("main.dat")?;
//! for record in table.records()? {
//!     let record = record?;
//!     println!("{}", record.get_str(MetadataField::Title).unwrap_or("?"));
//! }
//! # Ok::<(), nde::NdeError>(())
//! ```
//!
//! # Modules
//!
//! - [`binary`] — signatures and fixed header layouts
//! - [`field`] — single field decoding (`Field`, `FieldValue`)
//! - [`index`] — `Index` loaded from the `.idx` file
//! - [`schema`] — `MetadataField` names and the per-table `Schema`
//! - [`record`] — `Record`, one followed field chain
//! - [`table`] — `Table` and `TableOptions`
//! - [`records`] — `Records`, the lazy row scan
//! - [`track`] — `Track`, typed view over common metadata
//! - [`error`] — `NdeError` and `FormatError`

#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

pub mod binary;
pub mod error;
pub mod field;
pub mod index;
pub mod record;
pub mod records;
pub mod schema;
pub mod table;
pub mod track;

// Top-level re-exports for convenience
pub use binary::{FieldHeader, IndexEntry, IndexHeader};
pub use error::{FormatError, NdeError, Result};
pub use field::{decode_field, ColumnDef, Field, FieldType, FieldValue};
pub use index::Index;
pub use record::{Record, DEFAULT_MAX_CHAIN_LEN};
pub use records::Records;
pub use schema::{MetadataField, Schema, UnknownField};
pub use table::{Table, TableOptions};
pub use track::Track;
