//! Integration tests for the streaming writer
//!
//! Tests verify:
//! - Daily data accumulates in one all-time archive and accepts corrections
//! - Minute data lands in one archive per date regardless of call order
//! - Writing the same input twice leaves byte-identical archives
//! - Hour bars stamped with seconds are rewritten in place on a second write
//! - Out-of-order input stops the write after completed dates only
//! - Derivative day archives keep other contracts' entries
//! - Non-derivative day archives are rewritten from scratch

use chrono::{NaiveDate, NaiveDateTime};
use market_archive::config::WriterSettings;
use market_archive::output::csv::CsvLineCodec;
use market_archive::output::{ArchiveFile, StreamingWriter, WriterError};
use market_archive::{DataKind, Granularity, Record, SymbolId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn bar(time: NaiveDateTime, close: &str) -> Record {
    Record::new(time, vec![close.to_string(), "100".to_string()])
}

fn writer(root: &Path, symbol: &str, granularity: Granularity) -> StreamingWriter {
    let settings = WriterSettings::new(root)
        .with_granularity(granularity)
        .with_kind(DataKind::Trade);
    StreamingWriter::new(SymbolId::parse(symbol).unwrap(), settings, CsvLineCodec::new()).unwrap()
}

fn entry_text(path: &Path, entry: &str) -> String {
    let archive = ArchiveFile::open(path).unwrap().expect("archive exists");
    String::from_utf8(archive.entry(entry).expect("entry exists").to_vec()).unwrap()
}

/// Every file under `root` with its bytes
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.insert(path.clone(), std::fs::read(&path).unwrap());
            }
        }
    }
    files
}

#[test]
fn test_daily_scenario_with_correction() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("equity/usa/daily/aapl.zip");

    writer(dir.path(), "EQUITY:USA:AAPL", Granularity::Daily)
        .write(vec![bar(at(2, 0, 0), "300.35"), bar(at(3, 0, 0), "297.43")])
        .unwrap();

    let archive_file = ArchiveFile::open(&archive).unwrap().unwrap();
    assert_eq!(archive_file.entry_names().collect::<Vec<_>>(), vec!["aapl.csv"]);
    assert_eq!(
        entry_text(&archive, "aapl.csv"),
        "20200102 00:00,300.35,100\n20200103 00:00,297.43,100"
    );

    writer(dir.path(), "EQUITY:USA:AAPL", Granularity::Daily)
        .write(vec![bar(at(2, 0, 0), "300.40")])
        .unwrap();

    assert_eq!(
        entry_text(&archive, "aapl.csv"),
        "20200102 00:00,300.40,100\n20200103 00:00,297.43,100"
    );
}

#[test]
fn test_minute_scenario_any_call_order() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("equity/usa/minute/aapl");

    let mut writer = writer(dir.path(), "EQUITY:USA:AAPL", Granularity::Minute);
    writer.write(vec![bar(at(3, 9, 30), "b1"), bar(at(3, 9, 31), "b2")]).unwrap();
    writer.write(vec![bar(at(2, 9, 30), "a1")]).unwrap();

    assert_eq!(
        entry_text(&base.join("20200102_trade.zip"), "20200102_aapl_minute_trade.csv"),
        "34200000,a1,100"
    );
    assert_eq!(
        entry_text(&base.join("20200103_trade.zip"), "20200103_aapl_minute_trade.csv"),
        "34200000,b1,100\n34260000,b2,100"
    );

    let second_day = ArchiveFile::open(&base.join("20200103_trade.zip")).unwrap().unwrap();
    assert_eq!(second_day.len(), 1);
}

#[test]
fn test_idempotent_writes() {
    let records = || {
        vec![
            bar(at(2, 9, 30), "1"),
            bar(at(2, 15, 59), "2"),
            bar(at(3, 9, 30), "3"),
            bar(at(6, 9, 30), "4"),
        ]
    };

    for (symbol, granularity) in [
        ("EQUITY:USA:AAPL", Granularity::Minute),
        ("EQUITY:USA:AAPL", Granularity::Hour),
        ("FUTURE:CME:ES:2020-03-20", Granularity::Minute),
    ] {
        let once = TempDir::new().unwrap();
        writer(once.path(), symbol, granularity).write(records()).unwrap();

        let twice = TempDir::new().unwrap();
        writer(twice.path(), symbol, granularity).write(records()).unwrap();
        writer(twice.path(), symbol, granularity).write(records()).unwrap();

        let strip = |root: &Path| -> BTreeMap<PathBuf, Vec<u8>> {
            snapshot(root)
                .into_iter()
                .map(|(path, bytes)| (path.strip_prefix(root).unwrap().to_path_buf(), bytes))
                .collect()
        };
        assert_eq!(
            strip(once.path()),
            strip(twice.path()),
            "{symbol} at {granularity} is not idempotent"
        );
    }
}

#[test]
fn test_hour_bars_with_seconds_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let stamped = at(2, 10, 0) + chrono::Duration::seconds(30);

    for _ in 0..2 {
        writer(dir.path(), "EQUITY:USA:AAPL", Granularity::Hour)
            .write(vec![bar(stamped, "1")])
            .unwrap();
    }

    assert_eq!(
        entry_text(&dir.path().join("equity/usa/hour/aapl.zip"), "aapl.csv"),
        "20200102 10:00,1,100"
    );
}

#[test]
fn test_out_of_order_input() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("equity/usa/minute/aapl");

    let result = writer(dir.path(), "EQUITY:USA:AAPL", Granularity::Minute).write(vec![
        bar(at(2, 9, 30), "a"),
        bar(at(3, 9, 30), "b"),
        bar(at(3, 9, 45), "c"),
        bar(at(2, 16, 0), "late"),
    ]);

    assert!(matches!(
        result,
        Err(WriterError::OrderingViolation { previous, current })
            if previous == at(3, 9, 45) && current == at(2, 16, 0)
    ));
    assert_eq!(
        entry_text(&base.join("20200102_trade.zip"), "20200102_aapl_minute_trade.csv"),
        "34200000,a,100"
    );
    assert!(!base.join("20200103_trade.zip").exists());
}

#[test]
fn test_derivative_day_archive_keeps_other_contracts() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("future/cme/minute/es/20200102_trade.zip");

    writer(dir.path(), "FUTURE:CME:ES:2020-03-20", Granularity::Minute)
        .write(vec![bar(at(2, 9, 30), "h1")])
        .unwrap();
    writer(dir.path(), "FUTURE:CME:ES:2020-06-19", Granularity::Minute)
        .write(vec![bar(at(2, 9, 30), "m1")])
        .unwrap();
    writer(dir.path(), "FUTURE:CME:ES:2020-03-20", Granularity::Minute)
        .write(vec![bar(at(2, 10, 0), "h2")])
        .unwrap();

    let file = ArchiveFile::open(&archive).unwrap().unwrap();
    assert_eq!(
        file.entry_names().collect::<Vec<_>>(),
        vec![
            "20200102_es_minute_trade_20200320.csv",
            "20200102_es_minute_trade_20200619.csv"
        ]
    );
    assert_eq!(
        entry_text(&archive, "20200102_es_minute_trade_20200320.csv"),
        "36000000,h2,100"
    );
    assert_eq!(
        entry_text(&archive, "20200102_es_minute_trade_20200619.csv"),
        "34200000,m1,100"
    );
}

#[test]
fn test_replace_only_discards_previous_archive() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("equity/usa/minute/aapl/20200102_trade.zip");

    let mut stale = ArchiveFile::empty(&archive);
    stale.set_entry("leftover.csv", b"old".to_vec());
    stale.save().unwrap();

    writer(dir.path(), "EQUITY:USA:AAPL", Granularity::Minute)
        .write(vec![bar(at(2, 9, 30), "a")])
        .unwrap();

    let file = ArchiveFile::open(&archive).unwrap().unwrap();
    assert_eq!(
        file.entry_names().collect::<Vec<_>>(),
        vec!["20200102_aapl_minute_trade.csv"]
    );
}

#[test]
fn test_writer_uses_display_timezone_dates() {
    let dir = TempDir::new().unwrap();
    let settings = WriterSettings::new(dir.path())
        .with_granularity(Granularity::Minute)
        .with_timezone(chrono_tz::UTC);
    let mut writer = StreamingWriter::new(
        SymbolId::parse("CRYPTO:COINBASE:BTCUSD").unwrap(),
        settings,
        CsvLineCodec::new(),
    )
    .unwrap();

    // Times are already local; a late-evening record stays on its own date
    writer.write(vec![bar(at(2, 23, 59), "x")]).unwrap();
    assert!(dir
        .path()
        .join("crypto/coinbase/minute/btcusd/20200102_trade.zip")
        .exists());
}
