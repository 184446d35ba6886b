//! Telegram Bot API notifier
//!
//! Delivers result summaries with `sendMessage`. Bot token and chat id
//! come from configuration; without them the null notifier is used.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::ports::Notifier;

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Telegram rejects longer message texts
pub const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug)]
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self> {
        Self::new_with_base_url(bot_token, chat_id, TELEGRAM_API_URL)
    }

    /// Client against a custom API root (used with the mock server in tests)
    pub fn new_with_base_url(
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
        base_url: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        })
    }
}

impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }

    fn send(&self, message: &str) -> Result<String> {
        if !self.is_configured() {
            return Err(Error::UpstreamNotification(
                "telegram bot token or chat id missing".into(),
            ));
        }

        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let text: String = message.chars().take(MAX_MESSAGE_CHARS).collect();

        let response = self
            .client
            .post(&url)
            .json(&SendMessageRequest {
                chat_id: &self.chat_id,
                text: &text,
                disable_web_page_preview: true,
            })
            .send()
            // The URL embeds the bot token; keep it out of error text
            .map_err(|e| Error::UpstreamNotification(e.without_url().to_string()))?;

        let status = response.status();
        let body: ApiResponse = response.json().map_err(|e| {
            Error::UpstreamNotification(format!("unreadable response (HTTP {}): {}", status, e.without_url()))
        })?;

        if !status.is_success() || !body.ok {
            return Err(Error::UpstreamNotification(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.description.unwrap_or_else(|| "request rejected".into())
            )));
        }

        body.result
            .map(|m| m.message_id.to_string())
            .ok_or_else(|| Error::UpstreamNotification("response carried no message id".into()))
    }
}

/// Notifier used when no channel is configured; every send fails
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn name(&self) -> &str {
        "none"
    }

    fn is_configured(&self) -> bool {
        false
    }

    fn send(&self, _message: &str) -> Result<String> {
        Err(Error::UpstreamNotification("no notifier configured".into()))
    }
}
