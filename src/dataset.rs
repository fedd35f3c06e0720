//! Training dataset export.
//!
//! Rows carry the classifier features computed with the training period set
//! and a label saying whether the close three bars later was higher.

use crate::config::InstrumentConfig;
use crate::indicators::{IndicatorPeriods, IndicatorSnapshot};
use crate::market_data::{MIN_DATASET_BARS, PriceSeries};
use crate::quotes::QuoteSource;
use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const LABEL_HORIZON: usize = 3;
pub const FAVORABLE_LABEL: &str = "GAIN";
pub const UNFAVORABLE_LABEL: &str = "LOSS";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetRow {
    pub instrument: String,
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub atr: f64,
    pub label: String,
}

/// Labelled rows for one instrument. Warm-up bars and the final
/// `LABEL_HORIZON` bars (no future close yet) are left out.
pub fn build_rows(name: &str, series: &PriceSeries, periods: IndicatorPeriods) -> Vec<DatasetRow> {
    let snapshot = IndicatorSnapshot::compute(series, periods);
    let bars = series.bars();

    bars.iter()
        .zip(snapshot.rows())
        .enumerate()
        .filter_map(|(i, (bar, row))| {
            let features = row.features()?;
            let future = bars.get(i + LABEL_HORIZON)?;
            let label = if future.close > bar.close {
                FAVORABLE_LABEL
            } else {
                UNFAVORABLE_LABEL
            };
            Some(DatasetRow {
                instrument: name.to_string(),
                timestamp: bar.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                ema_fast: features.ema_fast,
                ema_slow: features.ema_slow,
                rsi: features.rsi,
                atr: features.atr,
                label: label.to_string(),
            })
        })
        .collect()
}

/// Fetch every instrument and collect its rows. Instruments that fail to
/// fetch or have fewer than `MIN_DATASET_BARS` bars are skipped.
pub fn collect_rows(
    source: &dyn QuoteSource,
    instruments: &[InstrumentConfig],
    interval: &str,
    lookback_days: u32,
) -> Vec<DatasetRow> {
    let mut rows = Vec::new();
    for instrument in instruments {
        info!("Downloading {} ({})...", instrument.name, instrument.symbol);
        let series = match source.fetch(&instrument.symbol, interval, lookback_days) {
            Ok(series) => series,
            Err(e) => {
                warn!("Insufficient data for {}: {}", instrument.name, e);
                continue;
            }
        };
        if series.len() < MIN_DATASET_BARS {
            warn!(
                "Insufficient data for {} ({} bars, need {})",
                instrument.name,
                series.len(),
                MIN_DATASET_BARS
            );
            continue;
        }
        let instrument_rows = build_rows(&instrument.name, &series, IndicatorPeriods::training());
        if instrument_rows.is_empty() {
            continue;
        }
        rows.extend(instrument_rows);
    }
    rows
}

pub fn write_csv(path: &Path, rows: &[DatasetRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PriceBar;
    use chrono::{Duration, TimeZone, Utc};

    fn series(n: usize) -> PriceSeries {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = (0..n)
            .map(|i| {
                // zig-zag so labels alternate
                let close = 100.0 + i as f64 * 0.1 + if i % 2 == 0 { 1.0 } else { -1.0 };
                PriceBar {
                    timestamp: base + Duration::hours(4 * i as i64),
                    open: close,
                    high: close + 0.5,
                    low: close - 0.5,
                    close,
                    volume: Some(1000.0),
                }
            })
            .collect();
        PriceSeries::new("TEST", bars)
    }

    #[test]
    fn test_rows_skip_warmup_and_horizon() {
        let s = series(120);
        let rows = build_rows("Test", &s, IndicatorPeriods::training());

        // slow EMA defined from index 49; last 3 bars have no label
        assert_eq!(rows.len(), 120 - 49 - LABEL_HORIZON);
        assert_eq!(rows[0].timestamp, s.bars()[49].timestamp.format("%Y-%m-%d %H:%M:%S").to_string());
    }

    #[test]
    fn test_labels_follow_future_close() {
        let s = series(120);
        let rows = build_rows("Test", &s, IndicatorPeriods::training());
        let closes = s.closes();

        for (offset, row) in rows.iter().enumerate() {
            let i = 49 + offset;
            let expected = if closes[i + 3] > closes[i] { "GAIN" } else { "LOSS" };
            assert_eq!(row.label, expected);
        }
    }
}
