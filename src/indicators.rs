use crate::market_data::{PriceBar, PriceSeries};
use log::debug;
use serde::{Deserialize, Serialize};

/// Smoothing windows for one indicator pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorPeriods {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi: usize,
    pub atr: usize,
}

impl IndicatorPeriods {
    /// Periods used when evaluating live instruments.
    pub const fn runtime() -> Self {
        Self {
            ema_fast: 25,
            ema_slow: 50,
            rsi: 14,
            atr: 14,
        }
    }

    /// Periods the offline classifier is trained with. The fast average is
    /// 21 bars here against 25 at runtime.
    pub const fn training() -> Self {
        Self {
            ema_fast: 21,
            ..Self::runtime()
        }
    }
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        Self::runtime()
    }
}

/// Indicator values for a single bar. `None` inside an indicator's warm-up.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorRow {
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
}

impl IndicatorRow {
    /// The classifier feature row, if every indicator is defined.
    pub fn features(&self) -> Option<FeatureRow> {
        Some(FeatureRow {
            atr: self.atr?,
            ema_fast: self.ema_fast?,
            ema_slow: self.ema_slow?,
            rsi: self.rsi?,
        })
    }
}

/// Complete indicator values, in the feature order the classifier expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub atr: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
}

impl FeatureRow {
    pub const NAMES: [&'static str; 4] = ["atr", "ema_fast", "ema_slow", "rsi"];

    pub fn to_array(&self) -> [f64; 4] {
        [self.atr, self.ema_fast, self.ema_slow, self.rsi]
    }
}

/// Per-bar indicators aligned one-to-one with a `PriceSeries`.
#[derive(Debug, Clone)]
pub struct IndicatorSnapshot {
    rows: Vec<IndicatorRow>,
}

impl IndicatorSnapshot {
    pub fn compute(series: &PriceSeries, periods: IndicatorPeriods) -> Self {
        let closes = series.closes();
        let ema_fast = ema(&closes, periods.ema_fast);
        let ema_slow = ema(&closes, periods.ema_slow);
        let rsi = rsi(&closes, periods.rsi);
        let atr = atr(series.bars(), periods.atr);

        let rows: Vec<IndicatorRow> = (0..closes.len())
            .map(|i| IndicatorRow {
                ema_fast: ema_fast[i],
                ema_slow: ema_slow[i],
                rsi: rsi[i],
                atr: atr[i],
            })
            .collect();

        if let Some(last) = rows.last() {
            debug!("Indicators for {}: {:?}", series.symbol(), last);
        }

        Self { rows }
    }

    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn latest(&self) -> Option<&IndicatorRow> {
        self.rows.last()
    }
}

/// Exponential moving average, alpha = 2 / (period + 1), seeded with the
/// first value and without bias correction.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let alpha = 2.0 / (period.max(1) as f64 + 1.0);
    let smoothed = exponential_smooth(values, alpha);
    mask_warmup(smoothed, period.saturating_sub(1))
}

/// Relative strength index with `1 / period` smoothing of gains and losses.
/// A smoothed loss of exactly zero yields 100.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for i in 1..n {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            gains[i] = change;
        } else if change < 0.0 {
            losses[i] = -change;
        }
    }

    let alpha = 1.0 / period.max(1) as f64;
    let avg_gain = exponential_smooth(&gains, alpha);
    let avg_loss = exponential_smooth(&losses, alpha);

    let rsi = avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&gain, &loss)| {
            if loss == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + gain / loss)
            }
        })
        .collect();

    mask_warmup(rsi, period)
}

/// True range per bar; the first bar has no previous close and uses
/// high - low alone.
pub fn true_range(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let range = bar.high - bar.low;
            match i.checked_sub(1).map(|p| bars[p].close) {
                Some(prev_close) => range
                    .max((bar.high - prev_close).abs())
                    .max((bar.low - prev_close).abs()),
                None => range,
            }
        })
        .collect()
}

/// Average true range: exponential average of the true range.
pub fn atr(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    ema(&true_range(bars), period)
}

fn exponential_smooth(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut result = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            Some(p) => alpha * v + (1.0 - alpha) * p,
            None => v,
        };
        result.push(next);
        prev = Some(next);
    }
    result
}

fn mask_warmup(values: Vec<f64>, warmup: usize) -> Vec<Option<f64>> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| (i >= warmup).then_some(v))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
        assert!(
            (actual - expected).abs() < epsilon,
            "actual={actual}, expected={expected}, epsilon={epsilon}"
        );
    }

    fn make_bars(data: &[(f64, f64, f64, f64)]) -> Vec<PriceBar> {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| PriceBar {
                timestamp: base + Duration::hours(4 * i as i64),
                open,
                high,
                low,
                close,
                volume: None,
            })
            .collect()
    }

    #[test]
    fn test_ema_known_values() {
        // alpha = 0.5, seeded with 10
        let result = ema(&[10.0, 11.0, 12.0, 13.0], 3);
        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_approx(result[2].unwrap(), 11.25, 1e-12);
        assert_approx(result[3].unwrap(), 12.125, 1e-12);
    }

    #[test]
    fn test_ema_period_one_tracks_input() {
        let result = ema(&[3.0, 5.0, 4.0], 1);
        assert_eq!(result, vec![Some(3.0), Some(5.0), Some(4.0)]);
    }

    #[test]
    fn test_short_input_is_all_warmup() {
        assert!(ema(&[1.0, 2.0], 25).iter().all(Option::is_none));
        assert!(rsi(&[1.0, 2.0], 14).iter().all(Option::is_none));
        assert!(ema(&[], 5).is_empty());
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let result = rsi(&closes, 14);
        assert_eq!(result[13], None);
        assert_eq!(result[14], Some(100.0));
        assert_eq!(result[19], Some(100.0));
    }

    #[test]
    fn test_rsi_flat_prices_is_100() {
        let result = rsi(&[5.0; 20], 14);
        assert_eq!(result[19], Some(100.0));
    }

    #[test]
    fn test_rsi_known_value() {
        // changes: +1, -1 with alpha = 0.5
        // gains:  0, 1, 0   -> 0, 0.5, 0.25
        // losses: 0, 0, 1   -> 0, 0, 0.5
        let result = rsi(&[10.0, 11.0, 10.0], 2);
        assert_approx(result[2].unwrap(), 100.0 - 100.0 / 1.5, 1e-12);
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let bars = make_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (110.0, 115.0, 108.0, 112.0),
        ]);
        let tr = true_range(&bars);
        assert_approx(tr[0], 10.0, 1e-12);
        assert_approx(tr[1], 8.0, 1e-12);
        assert_approx(tr[2], 9.0, 1e-12);
    }

    #[test]
    fn test_atr_matches_ema_of_true_range() {
        let bars = make_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 107.0, 98.0, 99.0),
        ]);
        let result = atr(&bars, 2);
        // alpha = 2/3: 10 -> 8.6667 -> 8.8889
        assert_eq!(result[0], None);
        assert_approx(result[1].unwrap(), 10.0 / 3.0 + 16.0 / 3.0, 1e-9);
        assert_approx(result[2].unwrap(), 6.0 + (26.0 / 3.0) / 3.0, 1e-9);
    }

    #[test]
    fn test_training_periods_differ_only_in_fast_ema() {
        let runtime = IndicatorPeriods::runtime();
        let training = IndicatorPeriods::training();
        assert_eq!(runtime.ema_fast, 25);
        assert_eq!(training.ema_fast, 21);
        assert_eq!(runtime.ema_slow, training.ema_slow);
        assert_eq!(runtime.rsi, training.rsi);
        assert_eq!(runtime.atr, training.atr);
    }

    #[test]
    fn test_snapshot_rows_align_with_series() {
        let data: Vec<(f64, f64, f64, f64)> = (0..60)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.3).sin();
                (c, c + 1.0, c - 1.0, c)
            })
            .collect();
        let series = PriceSeries::new("TEST", make_bars(&data));
        let snapshot = IndicatorSnapshot::compute(&series, IndicatorPeriods::runtime());

        assert_eq!(snapshot.len(), series.len());
        assert!(snapshot.rows()[48].features().is_none());
        assert!(snapshot.latest().unwrap().features().is_some());
    }

    proptest! {
        #[test]
        fn prop_rsi_bounded(closes in proptest::collection::vec(1.0f64..1000.0, 1..200)) {
            for v in rsi(&closes, 14).into_iter().flatten() {
                prop_assert!((0.0..=100.0).contains(&v));
            }
        }

        #[test]
        fn prop_atr_non_negative(
            rows in proptest::collection::vec((1.0f64..1000.0, 0.0f64..50.0, 0.0f64..1.0), 1..200)
        ) {
            let data: Vec<(f64, f64, f64, f64)> = rows
                .iter()
                .map(|&(low, spread, pos)| {
                    let high = low + spread;
                    (low, high, low, low + spread * pos)
                })
                .collect();
            for v in atr(&make_bars(&data), 14).into_iter().flatten() {
                prop_assert!(v >= 0.0);
            }
        }
    }
}
