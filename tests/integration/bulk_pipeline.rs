//! Integration tests for the bulk history pipeline
//!
//! Tests verify:
//! - Option chains are written as one archive per local date
//! - Coarse futures history is merged into the shared all-time archive
//! - A failed date save reports the date and keeps earlier dates
//! - Invalid requests are rejected before anything is written

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use market_archive::config::WriterSettings;
use market_archive::downloader::{BulkError, BulkHistoryPipeline};
use market_archive::fetcher::csv_source::CsvHistorySource;
use market_archive::output::csv::CsvLineCodec;
use market_archive::output::ArchiveFile;
use market_archive::{DataKind, Granularity, SymbolId};
use std::path::Path;
use tempfile::TempDir;

fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, day, hour, minute, 0).unwrap()
}

fn id(s: &str) -> SymbolId {
    SymbolId::parse(s).unwrap()
}

fn write_source(dir: &Path, name: &str, rows: &[&str]) {
    let mut content = String::from("time,close,volume\n");
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    std::fs::write(dir.join(name), content).unwrap();
}

fn pipeline(root: &Path, granularity: Granularity, kind: DataKind) -> BulkHistoryPipeline {
    let settings = WriterSettings::new(root)
        .with_granularity(granularity)
        .with_kind(kind);
    BulkHistoryPipeline::new(settings, CsvLineCodec::new())
}

fn entry_text(path: &Path, entry: &str) -> String {
    let archive = ArchiveFile::open(path).unwrap().expect("archive exists");
    String::from_utf8(archive.entry(entry).expect("entry exists").to_vec()).unwrap()
}

#[test]
fn test_option_chain_one_archive_per_date() {
    let source_dir = TempDir::new().unwrap();
    let data_dir = TempDir::new().unwrap();

    let call = id("OPTION:USA:AAPL:2020-03-20:C:300");
    let put = id("OPTION:USA:AAPL:2020-03-20:P:290");

    // 14:30 UTC is 09:30 in New York
    write_source(
        source_dir.path(),
        "aapl_trade_american_call_3000000_20200320.csv",
        &[
            "2020-01-02T14:30:00Z,10.5,3",
            "2020-01-03T14:31:00Z,11.0,1",
        ],
    );
    write_source(
        source_dir.path(),
        "aapl_trade_american_put_2900000_20200320.csv",
        &["2020-01-02T14:30:00Z,4.2,7"],
    );

    let summary = pipeline(data_dir.path(), Granularity::Minute, DataKind::Trade)
        .download_and_save(
            &CsvHistorySource::new(source_dir.path()),
            &[call, put],
            utc(2, 0, 0),
            utc(4, 0, 0),
        )
        .unwrap();

    assert_eq!(summary.symbols, 2);
    assert_eq!(summary.records, 3);
    assert_eq!(summary.dates_written, 2);
    assert_eq!(summary.archives_written, 2);
    assert_eq!(summary.entries_written, 3);

    let base = data_dir.path().join("option/usa/minute/aapl");
    let first_day = base.join("20200102_trade_american.zip");
    let archive = ArchiveFile::open(&first_day).unwrap().unwrap();
    assert_eq!(
        archive.entry_names().collect::<Vec<_>>(),
        vec![
            "20200102_aapl_minute_trade_american_call_3000000_20200320.csv",
            "20200102_aapl_minute_trade_american_put_2900000_20200320.csv"
        ]
    );
    assert_eq!(
        entry_text(
            &first_day,
            "20200102_aapl_minute_trade_american_call_3000000_20200320.csv"
        ),
        "34200000,10.5,3"
    );

    let second_day = base.join("20200103_trade_american.zip");
    let archive = ArchiveFile::open(&second_day).unwrap().unwrap();
    assert_eq!(archive.len(), 1);
    assert_eq!(
        entry_text(
            &second_day,
            "20200103_aapl_minute_trade_american_call_3000000_20200320.csv"
        ),
        "34260000,11.0,1"
    );
}

#[test]
fn test_rerun_replaces_contract_entry_only() {
    let source_dir = TempDir::new().unwrap();
    let data_dir = TempDir::new().unwrap();
    let march = id("FUTURE:CME:ES:2020-03-20");
    let june = id("FUTURE:CME:ES:2020-06-19");

    write_source(source_dir.path(), "es_trade_20200320.csv", &["2020-01-02T15:00:00Z,3200,1"]);
    write_source(source_dir.path(), "es_trade_20200619.csv", &["2020-01-02T15:00:00Z,3210,2"]);

    let pipeline = pipeline(data_dir.path(), Granularity::Minute, DataKind::Trade);
    let source = CsvHistorySource::new(source_dir.path());
    pipeline
        .download_and_save(&source, &[march.clone(), june], utc(2, 0, 0), utc(2, 23, 0))
        .unwrap();

    // Corrected source for one contract only
    write_source(source_dir.path(), "es_trade_20200320.csv", &["2020-01-02T15:01:00Z,3201,5"]);
    pipeline
        .download_and_save(&source, &[march], utc(2, 0, 0), utc(2, 23, 0))
        .unwrap();

    let archive = data_dir.path().join("future/cme/minute/es/20200102_trade.zip");
    assert_eq!(
        entry_text(&archive, "20200102_es_minute_trade_20200320.csv"),
        "36060000,3201,5"
    );
    assert_eq!(
        entry_text(&archive, "20200102_es_minute_trade_20200619.csv"),
        "36000000,3210,2"
    );
}

#[test]
fn test_coarse_futures_share_archive() {
    let source_dir = TempDir::new().unwrap();
    let data_dir = TempDir::new().unwrap();
    let march = id("FUTURE:CME:ES:2020-03-20");
    let june = id("FUTURE:CME:ES:2020-06-19");

    write_source(
        source_dir.path(),
        "es_quote_20200320.csv",
        &["2020-01-02 05:00:00,3200,1", "2020-01-03 05:00:00,3201,1"],
    );
    write_source(source_dir.path(), "es_quote_20200619.csv", &["2020-01-03 05:00:00,3250,4"]);

    let pipeline = pipeline(data_dir.path(), Granularity::Daily, DataKind::Quote);
    let source = CsvHistorySource::new(source_dir.path());
    let summary = pipeline
        .download_and_save(&source, &[march.clone(), june], utc(1, 0, 0), utc(10, 0, 0))
        .unwrap();

    assert_eq!(summary.archives_written, 1);
    assert_eq!(summary.entries_written, 2);
    assert_eq!(summary.dates_written, 0);

    let archive = data_dir.path().join("future/cme/daily/es_quote.zip");
    assert_eq!(
        entry_text(&archive, "es_quote_20200320.csv"),
        "20200102 00:00,3200,1\n20200103 00:00,3201,1"
    );
    assert_eq!(entry_text(&archive, "es_quote_20200619.csv"), "20200103 00:00,3250,4");

    // A later run merges into the existing entry
    write_source(source_dir.path(), "es_quote_20200320.csv", &["2020-01-06 05:00:00,3190,2"]);
    pipeline
        .download_and_save(&source, &[march], utc(6, 0, 0), utc(6, 23, 0))
        .unwrap();
    assert_eq!(
        entry_text(&archive, "es_quote_20200320.csv"),
        "20200102 00:00,3200,1\n20200103 00:00,3201,1\n20200106 00:00,3190,2"
    );
}

#[test]
fn test_failed_date_keeps_earlier_dates() {
    let source_dir = TempDir::new().unwrap();
    let data_dir = TempDir::new().unwrap();
    let march = id("FUTURE:CME:ES:2020-03-20");

    write_source(
        source_dir.path(),
        "es_trade_20200320.csv",
        &[
            "2020-01-02T15:00:00Z,3200,1",
            "2020-01-03T15:00:00Z,3201,1",
            "2020-01-06T15:00:00Z,3202,1",
        ],
    );

    // A directory where the second date's archive belongs cannot be replaced
    let base = data_dir.path().join("future/cme/minute/es");
    std::fs::create_dir_all(base.join("20200103_trade.zip")).unwrap();

    let result = pipeline(data_dir.path(), Granularity::Minute, DataKind::Trade).download_and_save(
        &CsvHistorySource::new(source_dir.path()),
        &[march],
        utc(2, 0, 0),
        utc(7, 0, 0),
    );

    match result {
        Err(BulkError::DateFailed { date, .. }) => {
            assert_eq!(date, NaiveDate::from_ymd_opt(2020, 1, 3).unwrap());
        }
        other => panic!("expected DateFailed, got {other:?}"),
    }
    assert_eq!(
        entry_text(&base.join("20200102_trade.zip"), "20200102_es_minute_trade_20200320.csv"),
        "36000000,3200,1"
    );
    assert!(!base.join("20200106_trade.zip").exists());
}

#[test]
fn test_invalid_requests_write_nothing() {
    let source_dir = TempDir::new().unwrap();
    let data_dir = TempDir::new().unwrap();
    let source = CsvHistorySource::new(source_dir.path());
    let trade = pipeline(data_dir.path(), Granularity::Minute, DataKind::Trade);

    let cases: Vec<(BulkHistoryPipeline, Vec<SymbolId>)> = vec![
        (trade.clone(), vec![]),
        (
            pipeline(data_dir.path(), Granularity::Minute, DataKind::OpenInterest),
            vec![id("FUTURE:CME:ES:2020-03-20")],
        ),
        (trade.clone(), vec![id("EQUITY:USA:AAPL")]),
        (
            trade.clone(),
            vec![id("FUTURE:CME:ES:2020-03-20"), id("OPTION:USA:ES:2020-03-20:C:1")],
        ),
        (
            trade.clone(),
            vec![id("FUTURE:CME:ES:2020-03-20"), id("FUTURE:CME:NQ:2020-03-20")],
        ),
        (
            trade.clone(),
            vec![id("FUTURE:CME:ES:2020-03-20"), id("FUTURE:CBOT:ES:2020-03-20")],
        ),
        (
            trade.clone(),
            vec![
                id("OPTION:USA:SPY:2020-03-20:C:300:AMERICAN"),
                id("OPTION:USA:SPY:2020-03-20:C:300:EUROPEAN"),
            ],
        ),
    ];

    for (pipeline, symbols) in cases {
        let result = pipeline.download_and_save(&source, &symbols, utc(2, 0, 0), utc(3, 0, 0));
        assert!(
            matches!(result, Err(BulkError::InvalidRequest(_))),
            "expected {symbols:?} to be rejected, got {result:?}"
        );
    }

    let result = trade.download_and_save(
        &source,
        &[id("FUTURE:CME:ES:2020-03-20")],
        utc(3, 0, 0),
        utc(2, 0, 0),
    );
    assert!(matches!(result, Err(BulkError::InvalidRequest(_))));

    assert_eq!(std::fs::read_dir(data_dir.path()).unwrap().count(), 0);
}
