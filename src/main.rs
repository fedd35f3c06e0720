use signalbot::classifier::ConfidenceGate;
use signalbot::clock::SystemClock;
use signalbot::config::BotConfig;
use signalbot::evaluator::ResilientEvaluator;
use signalbot::notifier::{LogNotifier, Notifier, WebhookNotifier};
use signalbot::quotes::TwelveDataClient;
use signalbot::scheduler::Scheduler;

use anyhow::Result;
use log::{info, warn};
use std::env;
use std::sync::Arc;

fn main() -> Result<()> {
    // Initialize logger with default info level if RUST_LOG not set
    if env::var("RUST_LOG").is_err() {
        unsafe {
            env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();
    info!("Starting session breakout signal bot");

    // Get config file from command line argument or use default
    let args: Vec<String> = env::args().collect();
    let config_file = args.get(1).map(String::as_str).unwrap_or("config.json");

    info!("Loading configuration from: {}", config_file);
    let config = BotConfig::load_from_file(config_file)?;

    let gate = ConfidenceGate::load(&config.classifier_path, &config.favorable_label);
    if !gate.is_enabled() {
        warn!("Running without a classifier: no signal will pass the confidence gate");
    }

    let notifier: Arc<dyn Notifier> = match &config.notification.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.as_str())?),
        None => {
            info!("No webhook configured, notifications go to the log");
            Arc::new(LogNotifier)
        }
    };

    let quotes = TwelveDataClient::from_env(&config.quotes.base_url, &config.quotes.api_key_env)?;
    let evaluator = ResilientEvaluator::from_config(&config, Box::new(quotes), gate, notifier.clone());

    let mut scheduler = Scheduler::from_config(&config, evaluator, notifier, Box::new(SystemClock));
    scheduler.run()
}
