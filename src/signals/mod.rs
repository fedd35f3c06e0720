//! Signal Generation Module
//!
//! Turns a price series plus its indicator snapshot into advisory trade
//! signals: session breakout first, then the confidence gate, then the
//! trend/momentum rules.

pub mod core;
pub mod decision;

pub use core::{Direction, TradeSignal, format_message, format_percent};
pub use decision::{DEFAULT_CONFIDENCE_THRESHOLD, SignalEngine};
