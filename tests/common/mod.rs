#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use mockall::mock;
use signalbot::classifier::{Classifier, ClassifierError, Prediction};
use signalbot::clock::ManualClock;
use signalbot::indicators::FeatureRow;
use signalbot::market_data::{DataError, PriceBar, PriceSeries};
use signalbot::notifier::Notifier;
use signalbot::quotes::QuoteSource;

mock! {
    pub Quotes {}

    impl QuoteSource for Quotes {
        fn fetch(&self, symbol: &str, interval: &str, lookback_days: u32) -> Result<PriceSeries, DataError>;
    }
}

mock! {
    pub Notify {}

    impl Notifier for Notify {
        fn send(&self, text: &str) -> anyhow::Result<()>;
    }
}

mock! {
    pub Model {}

    impl Classifier for Model {
        fn labels(&self) -> Vec<String>;
        fn predict(&self, features: &FeatureRow) -> Result<Prediction, ClassifierError>;
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()
}

/// A clock the test can inspect after handing it to a scheduler as
/// `Box<dyn Clock>`. Leaked for the lifetime of the test binary.
pub fn shared_clock() -> &'static ManualClock {
    Box::leak(Box::new(ManualClock::new(base_time())))
}

/// Gently rising 4h series with a zig-zag on top, so RSI settles around 57-60
/// and the fast EMA stays above the slow one. Bars fall on hours 0, 4, 8, 12,
/// 16 and 20; with 100 bars the latest one closes at 12:00, outside every
/// session, above the high of the last US bar (16:00).
pub fn uptrend_series(symbol: &str, n: usize) -> PriceSeries {
    zigzag_series(symbol, n, |i| 100.0 + 0.1 * i as f64 + if i % 2 == 1 { 0.6 } else { 0.0 })
}

/// Mirror image of [`uptrend_series`]: RSI near 40, fast EMA below the
/// slow one, latest close below the low of the last US bar.
pub fn downtrend_series(symbol: &str, n: usize) -> PriceSeries {
    zigzag_series(symbol, n, |i| 200.0 - 0.1 * i as f64 - if i % 2 == 1 { 0.6 } else { 0.0 })
}

fn zigzag_series(symbol: &str, n: usize, close_at: impl Fn(usize) -> f64) -> PriceSeries {
    let bars = (0..n)
        .map(|i| {
            let close = close_at(i);
            let open = if i == 0 { close } else { close_at(i - 1) };
            PriceBar {
                timestamp: base_time() + Duration::hours(4 * i as i64),
                open,
                high: open.max(close) + 0.2,
                low: open.min(close) - 0.2,
                close,
                volume: Some(1_000.0),
            }
        })
        .collect();
    PriceSeries::new(symbol, bars)
}

/// Classifier that always answers with the given probability of a gain.
pub fn fixed_model(gain_probability: f64) -> MockModel {
    let mut model = MockModel::new();
    model
        .expect_labels()
        .returning(|| vec!["GAIN".to_string(), "LOSS".to_string()]);
    model.expect_predict().returning(move |_| {
        let label = if gain_probability >= 0.5 { "GAIN" } else { "LOSS" };
        Ok(Prediction {
            label: label.to_string(),
            probabilities: vec![gain_probability, 1.0 - gain_probability],
        })
    });
    model
}
