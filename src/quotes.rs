//! Historical bar retrieval.
//!
//! [`TwelveDataClient`] talks to a Twelve Data style `time_series` endpoint.
//! Provider-side rejections and empty payloads come back as "unavailable"
//! [`DataError`]s; only transport failures are reported as
//! [`DataError::Network`].

use crate::market_data::{DataError, PriceSeries};
use chrono::{Duration as ChronoDuration, Utc};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.twelvedata.com";
pub const DEFAULT_API_KEY_ENV: &str = "TWELVE_DATA_API_KEY";
const OUTPUT_SIZE: u32 = 5000;

pub trait QuoteSource {
    /// Bars for `symbol` at `interval` covering the last `lookback_days`.
    fn fetch(&self, symbol: &str, interval: &str, lookback_days: u32) -> Result<PriceSeries, DataError>;
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    values: Vec<Map<String, Value>>,
}

pub struct TwelveDataClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
    api_key_env: String,
}

impl TwelveDataClient {
    /// Build a client reading its API key from `api_key_env`. A missing key
    /// is not an error here; every fetch reports it instead.
    pub fn from_env(base_url: impl Into<String>, api_key_env: &str) -> Result<Self, DataError> {
        let api_key = env::var(api_key_env).ok().filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            error!("{} not configured", api_key_env);
        }
        Self::new(base_url, api_key, api_key_env)
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        api_key_env: &str,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            api_key_env: api_key_env.to_string(),
        })
    }

    fn parse_response(symbol: &str, resp: TimeSeriesResponse) -> Result<PriceSeries, DataError> {
        if resp.status.as_deref() == Some("error") {
            let message = resp.message.unwrap_or_else(|| "unknown error".into());
            error!("Error fetching data for {}: {}", symbol, message);
            return Err(DataError::Provider {
                symbol: symbol.to_string(),
                message,
            });
        }
        if resp.values.is_empty() {
            warn!("No data for {}", symbol);
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
            });
        }

        let series = PriceSeries::from_records(symbol, resp.values)?;
        info!("Data retrieved for {} ({} bars)", symbol, series.len());
        Ok(series)
    }
}

impl QuoteSource for TwelveDataClient {
    fn fetch(&self, symbol: &str, interval: &str, lookback_days: u32) -> Result<PriceSeries, DataError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DataError::MissingApiKey(self.api_key_env.clone()))?;

        let end = Utc::now();
        let start = ChronoDuration::try_days(i64::from(lookback_days))
            .and_then(|lookback| end.checked_sub_signed(lookback))
            .ok_or_else(|| DataError::Malformed(format!("lookback of {lookback_days} days is out of range")))?;
        let url = format!("{}/time_series", self.base_url);
        let start_date = start.format("%Y-%m-%d").to_string();
        let end_date = end.format("%Y-%m-%d").to_string();
        let output_size = OUTPUT_SIZE.to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("start_date", start_date.as_str()),
                ("end_date", end_date.as_str()),
                ("apikey", api_key),
                ("format", "JSON"),
                ("timezone", "UTC"),
                ("outputsize", output_size.as_str()),
            ])
            .send()
            .map_err(|e| DataError::Network(format!("request for {symbol} failed: {e}")))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(DataError::Network(format!("HTTP {status} for {symbol}")));
        }
        if !status.is_success() {
            return Err(DataError::Provider {
                symbol: symbol.to_string(),
                message: format!("HTTP {status}"),
            });
        }

        let body: TimeSeriesResponse = resp
            .json()
            .map_err(|e| DataError::Malformed(format!("failed to parse response for {symbol}: {e}")))?;
        Self::parse_response(symbol, body)
    }
}
