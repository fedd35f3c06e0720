mod common;

use common::{MockQuotes, uptrend_series};
use signalbot::config::InstrumentConfig;
use signalbot::dataset::{LABEL_HORIZON, collect_rows, write_csv};
use signalbot::market_data::DataError;
use std::fs;

#[test]
fn test_collect_skips_short_and_failed_instruments() {
    let mut quotes = MockQuotes::new();
    quotes
        .expect_fetch()
        .times(3)
        .returning(|symbol, interval, lookback_days| {
            assert_eq!(interval, "4h");
            assert_eq!(lookback_days, 60);
            match symbol {
                "XAU/USD" => Ok(uptrend_series(symbol, 120)),
                "AAPL" => Ok(uptrend_series(symbol, 99)),
                _ => Err(DataError::Network("timeout".to_string())),
            }
        });

    let instruments = vec![
        InstrumentConfig::new("Gold Spot USD", "XAU/USD"),
        InstrumentConfig::new("Apple Inc", "AAPL"),
        InstrumentConfig::new("Tesla Inc", "TSLA"),
    ];

    let rows = collect_rows(&quotes, &instruments, "4h", 60);

    // slow EMA warm-up is 49 bars, the last LABEL_HORIZON bars have no label
    assert_eq!(rows.len(), 120 - 49 - LABEL_HORIZON);
    assert!(rows.iter().all(|row| row.instrument == "Gold Spot USD"));
    assert!(rows.iter().all(|row| row.label == "GAIN" || row.label == "LOSS"));
}

#[test]
fn test_write_csv_creates_parent_directory() {
    let mut quotes = MockQuotes::new();
    quotes
        .expect_fetch()
        .returning(|symbol, _, _| Ok(uptrend_series(symbol, 100)));
    let rows = collect_rows(
        &quotes,
        &[InstrumentConfig::new("Gold Spot USD", "XAU/USD")],
        "4h",
        60,
    );

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("datasets").join("training_dataset.csv");
    write_csv(&path, &rows).unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(
        lines.next(),
        Some("instrument,timestamp,open,high,low,close,volume,ema_fast,ema_slow,rsi,atr,label")
    );
    assert_eq!(lines.count(), rows.len());
}
