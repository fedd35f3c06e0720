use crate::clock::Clock;
use crate::config::{BotConfig, InstrumentConfig};
use crate::evaluator::ResilientEvaluator;
use crate::notifier::{Notifier, notify};
use crate::rate_limiter::RateLimiter;
use crate::signals::TradeSignal;
use chrono::{DateTime, Utc};
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// What one pass over the universe produced.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub signals: Vec<TradeSignal>,
    /// Instruments with no signal, in evaluation order.
    pub quiet_instruments: Vec<String>,
    pub summary_sent: bool,
}

pub struct Scheduler {
    universe: Vec<InstrumentConfig>,
    evaluator: ResilientEvaluator,
    limiter: RateLimiter,
    notifier: Arc<dyn Notifier>,
    clock: Box<dyn Clock>,
    pacing_delay: Duration,
    cycle_pause: Duration,
}

impl Scheduler {
    pub fn new(
        universe: Vec<InstrumentConfig>,
        evaluator: ResilientEvaluator,
        notifier: Arc<dyn Notifier>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let limiter = RateLimiter::new(8, Duration::from_secs(60), clock.as_ref());
        Self {
            universe,
            evaluator,
            limiter,
            notifier,
            clock,
            pacing_delay: Duration::from_secs(1),
            cycle_pause: Duration::from_secs(4 * 3600),
        }
    }

    pub fn from_config(
        config: &BotConfig,
        evaluator: ResilientEvaluator,
        notifier: Arc<dyn Notifier>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let limiter = RateLimiter::new(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_seconds),
            clock.as_ref(),
        );
        Self::new(config.instruments.clone(), evaluator, notifier, clock)
            .with_rate_limiter(limiter)
            .with_pacing_delay(config.pacing_delay())
            .with_cycle_pause(config.cycle_pause())
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_pacing_delay(mut self, delay: Duration) -> Self {
        self.pacing_delay = delay;
        self
    }

    pub fn with_cycle_pause(mut self, pause: Duration) -> Self {
        self.cycle_pause = pause;
        self
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Evaluate every instrument once, in configured order, then send the
    /// summary of instruments that produced nothing.
    pub fn run_cycle(&mut self) -> CycleReport {
        info!("Starting new monitoring cycle ({} instruments)", self.universe.len());
        let mut report = CycleReport::default();

        for instrument in &self.universe {
            self.limiter.check_limit(self.clock.as_ref());
            let signals = self.evaluator.evaluate(instrument, self.clock.as_ref());
            self.limiter.record_request();
            self.clock.sleep(self.pacing_delay);

            if signals.is_empty() {
                report.quiet_instruments.push(instrument.name.clone());
            }
            report.signals.extend(signals);
        }

        if !report.quiet_instruments.is_empty() {
            let summary = format_summary(self.clock.wall_time(), &report.quiet_instruments);
            report.summary_sent = notify(self.notifier.as_ref(), &summary);
        }

        info!(
            "Cycle finished: {} signals, {} instruments without signal",
            report.signals.len(),
            report.quiet_instruments.len()
        );
        report
    }

    /// One cycle followed by the pause before the next one.
    pub fn run_once(&mut self) -> CycleReport {
        let report = self.run_cycle();
        info!(
            "Waiting {:.1}h before next cycle...",
            self.cycle_pause.as_secs_f64() / 3600.0
        );
        self.clock.sleep(self.cycle_pause);
        report
    }

    /// Run cycles until the process is stopped.
    pub fn run(&mut self) -> ! {
        loop {
            self.run_once();
        }
    }
}

pub fn format_summary(at: DateTime<Utc>, instruments: &[String]) -> String {
    let lines: Vec<String> = instruments.iter().map(|name| format!("• {name}")).collect();
    format!(
        "📋 *Monitoring summary ({})*\nNo signals found for the following instruments:\n{}",
        at.format("%Y-%m-%d %H:%M"),
        lines.join("\n")
    )
}
