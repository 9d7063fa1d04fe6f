use chrono::NaiveDate;
use market_archive::output::path::{self, StorageMode};
use market_archive::output::{resolve, PathError};
use market_archive::{DataKind, Granularity, InstrumentCategory, SymbolId};
use std::path::{Path, PathBuf};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn id(s: &str) -> SymbolId {
    SymbolId::parse(s).unwrap()
}

#[test]
fn test_crypto_second_path() {
    let btc = id("CRYPTO:COINBASE:BTCUSD");
    let time = day(2021, 3, 4).and_hms_opt(23, 59, 59).unwrap();

    let loc = resolve(Path::new("/srv/data"), &btc, time, Granularity::Second, DataKind::Trade).unwrap();
    assert_eq!(
        loc.file,
        PathBuf::from("/srv/data/crypto/coinbase/second/btcusd/20210304_trade.zip")
    );
    assert_eq!(loc.entry, "20210304_btcusd_second_trade.csv");
}

#[test]
fn test_fractional_strike_scaled() {
    let put = id("OPTION:USA:SPY:2020-06-19:P:312.5:EUROPEAN");
    let time = day(2020, 1, 2).and_hms_opt(9, 30, 0).unwrap();

    let loc = resolve(Path::new("data"), &put, time, Granularity::Minute, DataKind::Trade).unwrap();
    assert_eq!(
        loc.file,
        PathBuf::from("data/option/usa/minute/spy/20200102_trade_european.zip")
    );
    assert_eq!(
        loc.entry,
        "20200102_spy_minute_trade_european_put_3125000_20200619.csv"
    );
}

#[test]
fn test_index_option_coarse() {
    let spx = id("INDEXOPTION:USA:SPX:2021-01-15:C:3700");
    let time = day(2020, 12, 1).and_hms_opt(0, 0, 0).unwrap();

    let loc = resolve(Path::new("data"), &spx, time, Granularity::Hour, DataKind::OpenInterest).unwrap();
    assert_eq!(
        loc.file,
        PathBuf::from("data/indexoption/usa/hour/spx_openinterest_american.zip")
    );
    assert_eq!(
        loc.entry,
        "spx_openinterest_american_call_37000000_20210115.csv"
    );
}

#[test]
fn test_chain_members_share_date_archive() {
    let date = day(2020, 1, 2);
    let canonical = id("FUTUREOPTION:CME:ES");
    let contracts = [
        id("FUTUREOPTION:CME:ES:2020-03-20:C:3000"),
        id("FUTUREOPTION:CME:ES:2020-03-20:P:3000"),
        id("FUTUREOPTION:CME:ES:2020-06-19:C:3100"),
    ];

    let expected = path::archive_path_for_date(
        Path::new("data"),
        &canonical,
        date,
        Granularity::Tick,
        DataKind::Quote,
    )
    .unwrap();

    let mut entries = Vec::new();
    for contract in &contracts {
        let file = path::archive_path_for_date(
            Path::new("data"),
            contract,
            date,
            Granularity::Tick,
            DataKind::Quote,
        )
        .unwrap();
        assert_eq!(file, expected);
        entries.push(path::entry_name(contract, date, Granularity::Tick, DataKind::Quote).unwrap());
    }

    entries.sort();
    entries.dedup();
    assert_eq!(entries.len(), 3, "each contract needs its own entry");
}

#[test]
fn test_canonical_entry_has_no_contract_suffix() {
    let es = id("FUTURE:CME:ES");
    let entry = path::entry_name(&es, day(2020, 1, 2), Granularity::Minute, DataKind::Trade).unwrap();
    assert_eq!(entry, "20200102_es_minute_trade.csv");
}

#[test]
fn test_commodity_unsupported() {
    let gold = id("COMMODITY:LME:GOLD");
    let time = day(2020, 1, 2).and_hms_opt(0, 0, 0).unwrap();

    let result = resolve(Path::new("data"), &gold, time, Granularity::Daily, DataKind::Trade);
    assert_eq!(
        result,
        Err(PathError::UnsupportedCategory(InstrumentCategory::Commodity))
    );
    assert!(StorageMode::lookup(InstrumentCategory::Commodity, Granularity::Minute).is_err());
}

#[test]
fn test_storage_mode_table() {
    use InstrumentCategory as C;

    for category in [C::Equity, C::Forex, C::Cfd, C::Crypto, C::Index] {
        assert_eq!(StorageMode::lookup(category, Granularity::Tick).unwrap(), StorageMode::ReplaceOnly);
        assert_eq!(StorageMode::lookup(category, Granularity::Hour).unwrap(), StorageMode::CoarseMergeable);
    }
    for category in [C::Future, C::Option, C::FutureOption, C::IndexOption] {
        assert_eq!(StorageMode::lookup(category, Granularity::Second).unwrap(), StorageMode::AppendMergeable);
        assert_eq!(StorageMode::lookup(category, Granularity::Daily).unwrap(), StorageMode::CoarseMergeable);
    }
}

#[test]
fn test_date_range_across_month_end() {
    let dates = path::date_range(day(2020, 1, 30), day(2020, 2, 2));
    assert_eq!(
        dates,
        vec![day(2020, 1, 30), day(2020, 1, 31), day(2020, 2, 1), day(2020, 2, 2)]
    );
    assert!(path::date_range(day(2020, 2, 2), day(2020, 1, 30)).is_empty());
}
