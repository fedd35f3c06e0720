//! Trade signal data shared by the decision engine, the notifier and the
//! signal log.

use crate::breakout::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An advisory trade. Built only by the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub instrument: String,
    pub direction: Direction,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub atr: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub confidence: f64,
    pub broken_sessions: Vec<Session>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Human-readable signal body sent to the notification channel.
pub fn format_message(signal: &TradeSignal) -> String {
    let sessions: Vec<&str> = signal.broken_sessions.iter().map(Session::name).collect();
    format!(
        "\n🔔 *TRADING SIGNAL ({direction})* - {time}\n\
         • Instrument: {instrument}\n\
         • Price: {price:.5}\n\
         • Stop Loss: {sl:.5}\n\
         • Take Profit: {tp:.5}\n\
         • ATR: {atr:.5}\n\
         • Fast EMA: {ema_fast:.5}\n\
         • Slow EMA: {ema_slow:.5}\n\
         • RSI: {rsi:.2}\n\
         • ML confidence: {confidence}\n\
         • Broken range: {sessions}\n",
        direction = signal.direction,
        time = signal.timestamp.format("%Y-%m-%d %H:%M"),
        instrument = signal.instrument,
        price = signal.price,
        sl = signal.stop_loss,
        tp = signal.take_profit,
        atr = signal.atr,
        ema_fast = signal.ema_fast,
        ema_slow = signal.ema_slow,
        rsi = signal.rsi,
        confidence = format_percent(signal.confidence),
        sessions = sessions.join(", "),
    )
}

/// `0.7` -> `"70.00%"`
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}
