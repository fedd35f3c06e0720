use super::core::{Direction, TradeSignal, format_message, format_percent};
use crate::breakout::{BreakoutSet, SessionBreakoutDetector};
use crate::classifier::ConfidenceGate;
use crate::indicators::{FeatureRow, IndicatorSnapshot};
use crate::market_data::{MIN_DECISION_BARS, PriceSeries};
use chrono::{DateTime, Utc};
use log::{info, warn};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.55;

const STOP_LOSS_ATR: f64 = 1.5;
const TAKE_PROFIT_ATR: f64 = 2.0;

/// Exclusive RSI bounds for each direction. The two bands overlap in
/// (40, 60) but the trend condition keeps the directions exclusive.
const BUY_RSI_BAND: (f64, f64) = (40.0, 70.0);
const SELL_RSI_BAND: (f64, f64) = (30.0, 60.0);

/// Breakout + confidence gated trend/momentum rules.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    confidence_threshold: f64,
    detector: SessionBreakoutDetector,
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl SignalEngine {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
            detector: SessionBreakoutDetector::new(),
        }
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Run breakout detection, the confidence gate and the directional rules
    /// against the latest bar of `series`.
    pub fn evaluate(
        &self,
        instrument: &str,
        series: &PriceSeries,
        snapshot: &IndicatorSnapshot,
        gate: &ConfidenceGate,
        timestamp: DateTime<Utc>,
    ) -> Vec<TradeSignal> {
        if series.len() < MIN_DECISION_BARS {
            return Vec::new();
        }
        let (Some(latest), Some(row)) = (series.latest(), snapshot.latest()) else {
            return Vec::new();
        };
        let Some(features) = row.features() else {
            warn!("Indicators incomplete on latest bar for {}, skipping", instrument);
            return Vec::new();
        };

        let breakouts = self.detector.detect(series);
        if breakouts.is_empty() {
            info!("No range breakout for {}, evaluation discarded", instrument);
            return Vec::new();
        }

        let confidence = gate.confidence(&features);
        info!(
            "ML evaluation for {}: price={:.5}, ATR={:.5}, RSI={:.2}, fast EMA={:.5}, slow EMA={:.5}, broken ranges={:?}, confidence={}",
            instrument,
            latest.close,
            features.atr,
            features.rsi,
            features.ema_fast,
            features.ema_slow,
            breakouts.names(),
            format_percent(confidence)
        );

        self.decide(instrument, latest.close, &features, &breakouts, confidence, timestamp)
    }

    /// The decision state machine on already-computed inputs.
    pub fn decide(
        &self,
        instrument: &str,
        price: f64,
        features: &FeatureRow,
        breakouts: &BreakoutSet,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> Vec<TradeSignal> {
        if breakouts.is_empty() {
            return Vec::new();
        }
        if confidence < self.confidence_threshold {
            info!(
                "Insufficient confidence for {}: {} < {}",
                instrument,
                format_percent(confidence),
                format_percent(self.confidence_threshold)
            );
            return Vec::new();
        }

        let mut signals = Vec::new();
        let rsi = features.rsi;

        if features.ema_fast > features.ema_slow && in_band(rsi, BUY_RSI_BAND) {
            signals.push(self.build_signal(
                instrument,
                Direction::Buy,
                price,
                features,
                breakouts,
                confidence,
                timestamp,
            ));
        }
        if features.ema_fast < features.ema_slow && in_band(rsi, SELL_RSI_BAND) {
            signals.push(self.build_signal(
                instrument,
                Direction::Sell,
                price,
                features,
                breakouts,
                confidence,
                timestamp,
            ));
        }

        if signals.is_empty() {
            info!(
                "No signals for {} despite range breakout and sufficient confidence",
                instrument
            );
        } else {
            let directions: Vec<&str> = signals.iter().map(|s| s.direction.as_str()).collect();
            info!("Signals generated for {}: {:?}", instrument, directions);
        }
        signals
    }

    #[allow(clippy::too_many_arguments)]
    fn build_signal(
        &self,
        instrument: &str,
        direction: Direction,
        price: f64,
        features: &FeatureRow,
        breakouts: &BreakoutSet,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> TradeSignal {
        let (stop_loss, take_profit) = match direction {
            Direction::Buy => (
                price - features.atr * STOP_LOSS_ATR,
                price + features.atr * TAKE_PROFIT_ATR,
            ),
            Direction::Sell => (
                price + features.atr * STOP_LOSS_ATR,
                price - features.atr * TAKE_PROFIT_ATR,
            ),
        };

        let mut signal = TradeSignal {
            instrument: instrument.to_string(),
            direction,
            price,
            stop_loss,
            take_profit,
            atr: features.atr,
            ema_fast: features.ema_fast,
            ema_slow: features.ema_slow,
            rsi: features.rsi,
            confidence,
            broken_sessions: breakouts.sessions().to_vec(),
            timestamp,
            message: String::new(),
        };
        signal.message = format_message(&signal);
        signal
    }
}

fn in_band(value: f64, (low, high): (f64, f64)) -> bool {
    low < value && value < high
}
