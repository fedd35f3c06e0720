use crate::signals::TradeSignal;
use anyhow::{Context, Result};
use log::error;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// One persisted line per emitted signal.
#[derive(Debug, Serialize)]
struct SignalRecord<'a> {
    instrument: &'a str,
    timestamp: String,
    price: f64,
    direction: &'a str,
    model_identifier: &'a str,
}

/// Append-only CSV record of emitted signals, written without a header:
/// `instrument,timestamp,price,direction,model_identifier`.
#[derive(Debug, Clone)]
pub struct SignalLog {
    path: PathBuf,
    model_identifier: String,
}

impl SignalLog {
    pub fn new(path: impl Into<PathBuf>, model_identifier: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            model_identifier: model_identifier.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, signal: &TradeSignal) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.serialize(SignalRecord {
            instrument: &signal.instrument,
            timestamp: signal.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            price: signal.price,
            direction: signal.direction.as_str(),
            model_identifier: &self.model_identifier,
        })?;
        writer.flush()?;
        Ok(())
    }

    /// Append, logging instead of returning a failure.
    pub fn record(&self, signal: &TradeSignal) {
        if let Err(e) = self.append(signal) {
            error!("Error recording signal for {}: {:#}", signal.instrument, e);
        }
    }
}
