use anyhow::{Context, Result, bail};
use log::{error, info};
use serde_json::json;
use std::time::Duration;

/// Delivery channel for signal and summary messages.
pub trait Notifier {
    fn send(&self, text: &str) -> Result<()>;
}

/// Send and swallow the failure, logging it. Delivery problems never reach
/// the evaluation loop.
pub fn notify(notifier: &dyn Notifier, text: &str) -> bool {
    match notifier.send(text) {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to deliver notification: {:#}", e);
            false
        }
    }
}

/// Writes messages to the log; used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, text: &str) -> Result<()> {
        info!("Notification:\n{}", text);
        Ok(())
    }
}

/// POSTs `{"text": ...}` to an HTTP endpoint.
pub struct WebhookNotifier {
    client: reqwest::blocking::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&json!({ "text": text }))
            .send()
            .with_context(|| format!("webhook request to {} failed", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("webhook returned HTTP {}", status);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn send(&self, _text: &str) -> Result<()> {
            Err(anyhow!("channel down"))
        }
    }

    #[test]
    fn test_notify_swallows_failures() {
        assert!(!notify(&FailingNotifier, "hello"));
        assert!(notify(&LogNotifier, "hello"));
    }
}
