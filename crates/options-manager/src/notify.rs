//! Notification sinks.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use theta_core::{AlertCategory, AlertEvent, FetchError, NotificationSink, TelegramConfig};
use tracing::{error, info, warn};

/// Posts rendered alerts to a Telegram chat via the Bot API.
#[derive(Debug, Clone)]
pub struct TelegramSink {
    http: Client,
    url: String,
    chat_id: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

impl TelegramSink {
    pub fn new(config: &TelegramConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Telegram HTTP client")?;
        let url = format!(
            "{}/bot{}/sendMessage",
            config.api_url.trim_end_matches('/'),
            config.bot_token
        );
        Ok(Self {
            http,
            url,
            chat_id: config.chat_id.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, event: &AlertEvent) -> Result<(), FetchError> {
        let text = event.render();
        let response = self
            .http
            .post(&self.url)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text: &text,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout)
                } else {
                    FetchError::unavailable(format!("telegram request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::unavailable(format!("telegram {status}: {body}")));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

/// Writes alerts to the log. Always configured, so every alert leaves a
/// trace even when no chat sink is reachable.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, event: &AlertEvent) -> Result<(), FetchError> {
        let text = event.render();
        match event.category {
            AlertCategory::Error => error!(category = %event.category, "{text}"),
            AlertCategory::Skipped => warn!(category = %event.category, "{text}"),
            _ => info!(category = %event.category, "{text}"),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
