use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;

use super::{NotificationSender, SenderError};
use crate::notifications::models::ChannelConfig;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Sends alerts through the Telegram Bot API.
pub struct TelegramSender {
    client: Client,
    api_base: String,
}

impl Default for TelegramSender {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl TelegramSender {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            api_base: TELEGRAM_API_BASE.to_string(),
        }
    }

    fn send_message_url(&self, bot_token: &str) -> String {
        format!("{}/bot{bot_token}/sendMessage", self.api_base)
    }
}

/// Escapes text for Telegram MarkdownV2.
fn escape_markdown_v2(text: &str) -> String {
    let mut escaped_text = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
                | '{' | '}' | '.' | '!'
        ) {
            escaped_text.push('\\');
        }
        escaped_text.push(c);
    }
    escaped_text
}

#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(
        &self,
        config: &ChannelConfig,
        message: &str,
        _context: &HashMap<String, String>,
    ) -> Result<(), SenderError> {
        let ChannelConfig::Telegram { bot_token, chat_id } = config else {
            return Err(SenderError::InvalidConfiguration(
                "Expected Telegram config, but found a different type.".to_string(),
            ));
        };

        let escaped_message = escape_markdown_v2(message);
        let payload = TelegramMessage {
            chat_id,
            text: &escaped_message,
            parse_mode: "MarkdownV2",
        };

        let response = self
            .client
            .post(self.send_message_url(bot_token))
            .json(&payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Telegram API returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}
