//! Single-instrument evaluation with bounded retry.
//!
//! Soft validation failures (no data, too few bars) short-circuit as
//! [`EvalError::Unavailable`] and never consume a retry. Everything else is
//! [`EvalError::Failed`] and is retried on a fixed delay until the attempt
//! budget runs out. No error leaves [`ResilientEvaluator::evaluate`].

use crate::classifier::ConfidenceGate;
use crate::clock::Clock;
use crate::config::{BotConfig, InstrumentConfig, RetryConfig};
use crate::indicators::{IndicatorPeriods, IndicatorSnapshot};
use crate::market_data::{DataError, MIN_LIVE_BARS};
use crate::notifier::{Notifier, notify};
use crate::quotes::QuoteSource;
use crate::signal_log::SignalLog;
use crate::signals::{SignalEngine, TradeSignal};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("data unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl From<DataError> for EvalError {
    fn from(e: DataError) -> Self {
        if e.is_unavailable() {
            EvalError::Unavailable(e.to_string())
        } else {
            EvalError::Failed(e.into())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_secs(config.delay_seconds),
        }
    }
}

/// Where and how far back to fetch bars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchParams {
    pub interval: String,
    pub lookback_days: u32,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            interval: "4h".to_string(),
            lookback_days: 60,
        }
    }
}

pub struct ResilientEvaluator {
    quotes: Box<dyn QuoteSource>,
    gate: ConfidenceGate,
    engine: SignalEngine,
    notifier: Arc<dyn Notifier>,
    signal_log: SignalLog,
    fetch: FetchParams,
    periods: IndicatorPeriods,
    retry: RetryPolicy,
    min_bars: usize,
}

impl ResilientEvaluator {
    pub fn new(
        quotes: Box<dyn QuoteSource>,
        gate: ConfidenceGate,
        engine: SignalEngine,
        notifier: Arc<dyn Notifier>,
        signal_log: SignalLog,
    ) -> Self {
        Self {
            quotes,
            gate,
            engine,
            notifier,
            signal_log,
            fetch: FetchParams::default(),
            periods: IndicatorPeriods::runtime(),
            retry: RetryPolicy::default(),
            min_bars: MIN_LIVE_BARS,
        }
    }

    /// Wire an evaluator from configuration.
    pub fn from_config(
        config: &BotConfig,
        quotes: Box<dyn QuoteSource>,
        gate: ConfidenceGate,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::new(
            quotes,
            gate,
            SignalEngine::new(config.confidence_threshold),
            notifier,
            SignalLog::new(&config.signal_log_path, &config.classifier_path),
        )
        .with_fetch_params(FetchParams {
            interval: config.sampling_interval.clone(),
            lookback_days: config.lookback_days,
        })
        .with_retry_policy(RetryPolicy::from(&config.retry))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fetch_params(mut self, fetch: FetchParams) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Evaluate one instrument end to end. Emitted signals are delivered to
    /// the notifier and appended to the signal log before being returned.
    pub fn evaluate(&self, instrument: &InstrumentConfig, clock: &dyn Clock) -> Vec<TradeSignal> {
        let max_attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            info!(
                "Evaluating {} ({}) [attempt {}]",
                instrument.name, instrument.symbol, attempt
            );

            match self.try_evaluate(instrument, clock) {
                Ok(signals) => {
                    self.dispatch(&signals);
                    return signals;
                }
                Err(EvalError::Unavailable(reason)) => {
                    warn!("Skipping {}: {}", instrument.name, reason);
                    return Vec::new();
                }
                Err(EvalError::Failed(e)) if attempt < max_attempts => {
                    warn!(
                        "Attempt {} for {} failed ({:#}). Retrying in {}s...",
                        attempt,
                        instrument.name,
                        e,
                        self.retry.delay.as_secs_f64()
                    );
                    clock.sleep(self.retry.delay);
                }
                Err(EvalError::Failed(e)) => {
                    error!("Giving up on {}: {:#}", instrument.name, e);
                }
            }
        }
        Vec::new()
    }

    /// One attempt, without retry or delivery.
    pub fn try_evaluate(
        &self,
        instrument: &InstrumentConfig,
        clock: &dyn Clock,
    ) -> Result<Vec<TradeSignal>, EvalError> {
        let series = self
            .quotes
            .fetch(&instrument.symbol, &self.fetch.interval, self.fetch.lookback_days)?;

        if series.len() < self.min_bars {
            return Err(EvalError::Unavailable(format!(
                "not enough data ({} bars, need {})",
                series.len(),
                self.min_bars
            )));
        }

        let snapshot = IndicatorSnapshot::compute(&series, self.periods);
        Ok(self.engine.evaluate(
            &instrument.name,
            &series,
            &snapshot,
            &self.gate,
            clock.wall_time(),
        ))
    }

    fn dispatch(&self, signals: &[TradeSignal]) {
        for signal in signals {
            notify(self.notifier.as_ref(), &signal.message);
            self.signal_log.record(signal);
        }
    }
}
