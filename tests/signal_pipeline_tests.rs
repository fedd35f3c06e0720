mod common;

use common::{base_time, downtrend_series, fixed_model, uptrend_series};
use signalbot::breakout::{Session, SessionBreakoutDetector};
use signalbot::classifier::ConfidenceGate;
use signalbot::indicators::{IndicatorPeriods, IndicatorSnapshot};
use signalbot::signals::{Direction, SignalEngine};

fn gate(gain_probability: f64) -> ConfidenceGate {
    ConfidenceGate::new(Box::new(fixed_model(gain_probability)), "GAIN")
}

#[test]
fn test_uptrend_fixture_preconditions() {
    let series = uptrend_series("XAU/USD", 100);
    let snapshot = IndicatorSnapshot::compute(&series, IndicatorPeriods::runtime());
    let features = snapshot.latest().and_then(|row| row.features()).unwrap();

    assert!(features.ema_fast > features.ema_slow);
    assert!(features.rsi > 40.0 && features.rsi < 70.0, "rsi = {}", features.rsi);
    assert!(SessionBreakoutDetector::new().detect(&series).contains(Session::Us));
}

#[test]
fn test_us_breakout_in_uptrend_emits_buy() {
    let series = uptrend_series("XAU/USD", 100);
    let snapshot = IndicatorSnapshot::compute(&series, IndicatorPeriods::runtime());
    let engine = SignalEngine::default();

    let signals = engine.evaluate("Gold Spot USD", &series, &snapshot, &gate(0.7), base_time());

    assert_eq!(signals.len(), 1);
    let signal = &signals[0];
    let price = series.latest().unwrap().close;
    assert_eq!(signal.direction, Direction::Buy);
    assert_eq!(signal.instrument, "Gold Spot USD");
    assert_eq!(signal.price, price);
    assert!((signal.stop_loss - (price - 1.5 * signal.atr)).abs() < 1e-9);
    assert!((signal.take_profit - (price + 2.0 * signal.atr)).abs() < 1e-9);
    assert!(signal.broken_sessions.contains(&Session::Us));
    assert!((signal.confidence - 0.7).abs() < 1e-12);
    assert!(signal.message.contains("TRADING SIGNAL (BUY)"));
    assert!(signal.message.contains("70.00%"));
}

#[test]
fn test_low_confidence_suppresses_signal() {
    let series = uptrend_series("XAU/USD", 100);
    let snapshot = IndicatorSnapshot::compute(&series, IndicatorPeriods::runtime());

    let signals = SignalEngine::default().evaluate("Gold Spot USD", &series, &snapshot, &gate(0.4), base_time());

    assert!(signals.is_empty());
}

#[test]
fn test_threshold_is_inclusive() {
    let series = uptrend_series("XAU/USD", 100);
    let snapshot = IndicatorSnapshot::compute(&series, IndicatorPeriods::runtime());

    let signals = SignalEngine::new(0.7).evaluate("Gold Spot USD", &series, &snapshot, &gate(0.7), base_time());

    assert_eq!(signals.len(), 1);
}

#[test]
fn test_us_breakdown_in_downtrend_emits_sell() {
    let series = downtrend_series("XAG/AUD", 100);
    let snapshot = IndicatorSnapshot::compute(&series, IndicatorPeriods::runtime());

    let signals = SignalEngine::default().evaluate("Silver Spot AUD", &series, &snapshot, &gate(0.8), base_time());

    assert_eq!(signals.len(), 1);
    let signal = &signals[0];
    let price = series.latest().unwrap().close;
    assert_eq!(signal.direction, Direction::Sell);
    assert!((signal.stop_loss - (price + 1.5 * signal.atr)).abs() < 1e-9);
    assert!((signal.take_profit - (price - 2.0 * signal.atr)).abs() < 1e-9);
    assert!(signal.stop_loss > price && signal.take_profit < price);
}

#[test]
fn test_disabled_gate_never_signals() {
    let series = uptrend_series("XAU/USD", 100);
    let snapshot = IndicatorSnapshot::compute(&series, IndicatorPeriods::runtime());

    let signals =
        SignalEngine::default().evaluate("Gold Spot USD", &series, &snapshot, &ConfidenceGate::disabled(), base_time());

    assert!(signals.is_empty());
}

#[test]
fn test_no_breakout_skips_classifier() {
    // Truncated so the latest bar is a US bar: it cannot break its own range
    // and every earlier session high sits above its close.
    let series = uptrend_series("XAU/USD", 95);
    let snapshot = IndicatorSnapshot::compute(&series, IndicatorPeriods::runtime());

    let mut model = common::MockModel::new();
    model
        .expect_labels()
        .returning(|| vec!["GAIN".to_string(), "LOSS".to_string()]);
    model.expect_predict().times(0);
    let gate = ConfidenceGate::new(Box::new(model), "GAIN");

    let signals = SignalEngine::default().evaluate("Gold Spot USD", &series, &snapshot, &gate, base_time());

    assert!(signals.is_empty());
}
