// Desktop/tooling crate — unwrap/expect/panic acceptable in non-library code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod dump;
mod info;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nde::Table;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(
    about = "Winamp media library (NDE) inspection tasks",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every track of a library database
    Dump {
        /// Table file, usually `main.dat`
        db: PathBuf,
        /// Index file; defaults to the table path with an `.idx` extension
        index: Option<PathBuf>,
        /// One JSON object per line instead of BEGIN TRACK blocks
        #[arg(long)]
        json: bool,
        /// Stop after this many tracks
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Summarise a library database: record count, index id, schema
    Info {
        /// Table file, usually `main.dat`
        db: PathBuf,
        /// Index file; defaults to the table path with an `.idx` extension
        index: Option<PathBuf>,
        /// Also list every raw index entry
        #[arg(long)]
        offsets: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Dump {
            db,
            index,
            json,
            limit,
        } => {
            let mut table = open_table(&db, index)?;
            let format = if json {
                dump::Format::Json
            } else {
                dump::Format::Blocks
            };
            dump::run(&mut table, format, limit)
        }
        Commands::Info { db, index, offsets } => {
            let table = open_table(&db, index)?;
            info::run(&table, offsets)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_table(db: &Path, index: Option<PathBuf>) -> Result<Table> {
    let table = match index {
        Some(index) => Table::open_with_index(db, index),
        None => Table::open(db),
    };
    let context = || format!("failed to open media library {}", db.display());
    table.with_context(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nde::{FormatError, NdeError};
    use nde_testing::{FixtureField, LibraryFixture};
    use tempfile::TempDir;

    fn write_library(dir: &Path) -> (PathBuf, PathBuf) {
        LibraryFixture::new()
            .column(1, "title")
            .row(vec![FixtureField::string(1, "So What")])
            .build()
            .write_to(dir, "main")
            .unwrap()
    }

    #[test]
    fn open_table_reads_sibling_index_by_default() {
        let tmp = TempDir::new().unwrap();
        let (dat, _) = write_library(tmp.path());
        let table = open_table(&dat, None).unwrap();
        assert_eq!(table.record_count().unwrap(), 1);
    }

    #[test]
    fn open_table_honours_index_override() {
        let tmp = TempDir::new().unwrap();
        let (dat, idx) = write_library(tmp.path());
        let moved = tmp.path().join("library.idx");
        std::fs::rename(&idx, &moved).unwrap();

        assert!(open_table(&dat, None).is_err());
        let table = open_table(&dat, Some(moved)).unwrap();
        assert_eq!(table.index().unwrap().len(), 3);
        assert_eq!(table.record_count().unwrap(), 1);
    }

    #[test]
    fn zero_length_dat_reports_context_and_cause() {
        let tmp = TempDir::new().unwrap();
        let dat = tmp.path().join("main.dat");
        std::fs::write(&dat, b"").unwrap();

        let err = open_table(&dat, None).unwrap_err();
        assert!(format!("{err:#}").contains("failed to open media library"));
        let cause = err.downcast_ref::<NdeError>().and_then(NdeError::as_format);
        assert_eq!(cause, Some(&FormatError::NotATable));
    }
}
