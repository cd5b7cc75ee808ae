//! Criterion benchmarks for NDE table scanning.
//!
//! Run: cargo bench -p nde --bench scan
//!
//! Results show:
//!   full_scan/*       — `Records` + `Track::from_record` over every row
//!   open_table        — signature check, index load and schema build
//!   random_access_100 — 100 `Table::record` lookups spread over the index

#![allow(
    clippy::unwrap_used,              // benchmark helpers use unwrap for brevity
    clippy::expect_used,
    clippy::panic,
    clippy::arithmetic_side_effects,
    missing_docs,                     // criterion_group! macro generates undocumented items
)]

use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use nde::{Table, Track};
use nde_testing::{FixtureField, LibraryFixture};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_row(n: i32) -> Vec<FixtureField> {
    let (a, b, t) = (n % 100, n % 500, n % 20);
    let path = format!(r"C:\Music\Artist {a:03}\Album {b:03}\{t:02}.mp3");
    vec![
        FixtureField::filename(0, &path),
        FixtureField::string(1, &format!("Track {n:05}")),
        FixtureField::string(2, &format!("Artist {:03}", n % 100)),
        FixtureField::string(3, &format!("Album {:03}", n % 500)),
        FixtureField::integer(4, 1990 + n % 30),
        FixtureField::integer(7, n % 20 + 1),
        FixtureField::length(8, 180 + n % 240),
        FixtureField::datetime(10, 1_200_000_000 + n),
        FixtureField::integer(11, n % 6),
        FixtureField::integer(15, n % 50),
    ]
}

fn build_temp_library(rows: i32) -> (TempDir, std::path::PathBuf) {
    let mut fixture = LibraryFixture::new().columns(&[
        (0, "filename"),
        (1, "title"),
        (2, "artist"),
        (3, "album"),
        (4, "year"),
        (7, "trackno"),
        (8, "length"),
        (10, "lastplay"),
        (11, "rating"),
        (15, "playcount"),
    ]);
    for n in 0..rows {
        fixture = fixture.row(make_row(n));
    }
    let tmp = TempDir::new().unwrap();
    let (dat, _) = fixture.build().write_to(tmp.path(), "main").unwrap();
    (tmp, dat)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_full_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_scan");
    group.measurement_time(Duration::from_secs(10));

    for rows in [1_000i32, 10_000] {
        let (_tmp, dat) = build_temp_library(rows);
        group.bench_with_input(BenchmarkId::new("rows", rows), &dat, |b, dat| {
            b.iter(|| {
                let mut table = Table::open(dat).unwrap();
                let mut tracks = 0usize;
                for record in table.records().unwrap().filter_map(Result::ok) {
                    black_box(Track::from_record(&record));
                    tracks += 1;
                }
                black_box(tracks)
            });
        });
    }
    group.finish();
}

fn bench_open(c: &mut Criterion) {
    let (_tmp, dat) = build_temp_library(10_000);
    c.bench_function("open_table", |b| {
        b.iter(|| black_box(Table::open(&dat).unwrap().record_count().unwrap()));
    });
}

fn bench_random_access(c: &mut Criterion) {
    let (_tmp, dat) = build_temp_library(10_000);
    let mut table = Table::open(&dat).unwrap();
    c.bench_function("random_access_100", |b| {
        b.iter(|| {
            for i in 0..100usize {
                let position = 2 + (i * 97) % 10_000;
                black_box(table.record(position).unwrap().len());
            }
        });
    });
}

criterion_group!(benches, bench_full_scan, bench_open, bench_random_access);
criterion_main!(benches);
