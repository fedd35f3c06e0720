pub mod breakout;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod dataset;
pub mod evaluator;
pub mod indicators;
pub mod market_data;
pub mod notifier;
pub mod quotes;
pub mod rate_limiter;
pub mod scheduler;
pub mod signal_log;
pub mod signals;
