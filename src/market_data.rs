use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Minimum bars before an instrument is evaluated live.
pub const MIN_LIVE_BARS: usize = 60;
/// Minimum bars before the decision engine looks at a series.
pub const MIN_DECISION_BARS: usize = 50;
/// Minimum bars before an instrument contributes to the training dataset.
pub const MIN_DATASET_BARS: usize = 100;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("no data returned for {symbol}")]
    NoData { symbol: String },

    #[error("provider rejected request for {symbol}: {message}")]
    Provider { symbol: String, message: String },

    #[error("missing columns for {symbol}: {columns}")]
    MissingColumns { symbol: String, columns: String },

    #[error("API key not configured (expected env var {0})")]
    MissingApiKey(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("network error: {0}")]
    Network(String),
}

impl DataError {
    /// Whether the failure means "there is nothing to evaluate" rather than
    /// a transient fault worth retrying.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, DataError::Network(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

/// Cleaned, time-ordered bars for one instrument.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series from already-typed bars. Bars are sorted ascending and
    /// duplicate timestamps keep the last occurrence.
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        let mut by_time: BTreeMap<DateTime<Utc>, PriceBar> = BTreeMap::new();
        for bar in bars {
            by_time.insert(bar.timestamp, bar);
        }
        Self {
            symbol: symbol.into(),
            bars: by_time.into_values().collect(),
        }
    }

    /// Build a series from loosely-typed provider records.
    ///
    /// Column names are lower-cased. When no record carries a `close` field
    /// it is synthesized as the mean of open/high/low. Values may be JSON
    /// numbers or numeric strings; records whose timestamp or OHLC values
    /// fail to parse are dropped.
    pub fn from_records(symbol: &str, records: Vec<Map<String, Value>>) -> Result<Self, DataError> {
        if records.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
            });
        }

        let records: Vec<Map<String, Value>> = records
            .into_iter()
            .map(|record| {
                record
                    .into_iter()
                    .map(|(key, value)| (key.to_lowercase(), value))
                    .collect()
            })
            .collect();

        let has_column = |name: &str| records.iter().any(|r| r.contains_key(name));
        let synthesize_close = !has_column("close");
        if synthesize_close {
            let missing: Vec<&str> = ["open", "high", "low"]
                .into_iter()
                .filter(|c| !has_column(c))
                .collect();
            if !missing.is_empty() {
                return Err(DataError::MissingColumns {
                    symbol: symbol.to_string(),
                    columns: missing.join(","),
                });
            }
            warn!("'close' not available for {}, estimating as mean of open/high/low", symbol);
        }

        let total = records.len();
        let mut bars = Vec::with_capacity(total);
        for record in &records {
            match parse_record(record, synthesize_close) {
                Some(bar) => bars.push(bar),
                None => debug!("Dropping unparseable record for {}: {:?}", symbol, record),
            }
        }

        if bars.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
            });
        }
        if bars.len() < total {
            debug!("Dropped {} of {} records for {}", total - bars.len(), total, symbol);
        }

        Ok(Self::new(symbol, bars))
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn latest(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

fn parse_record(record: &Map<String, Value>, synthesize_close: bool) -> Option<PriceBar> {
    let timestamp = record.get("datetime").and_then(parse_timestamp)?;
    let open = record.get("open").and_then(coerce_number)?;
    let high = record.get("high").and_then(coerce_number)?;
    let low = record.get("low").and_then(coerce_number)?;
    let close = if synthesize_close {
        (open + high + low) / 3.0
    } else {
        record.get("close").and_then(coerce_number)?
    };
    let volume = record.get("volume").and_then(coerce_number);

    Some(PriceBar {
        timestamp,
        open,
        high,
        low,
        close,
        volume,
    })
}

/// Numeric coercion: JSON numbers and numeric strings; anything else, or a
/// non-finite result, is treated as missing.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Parse provider timestamps. Offsets are honoured; naive values are taken
/// as UTC.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
