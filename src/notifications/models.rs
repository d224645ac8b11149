use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where an alert can be pushed besides the local console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChannelConfig {
    Telegram {
        bot_token: String,
        chat_id: String,
    },
    Webhook {
        url: String,
        #[serde(default = "default_webhook_method")]
        method: String, // "GET" or "POST"
        #[serde(default)]
        headers: Option<HashMap<String, String>>,
        #[serde(default)]
        body_template: Option<String>, // Tera template rendered against the alert context
    },
}

fn default_webhook_method() -> String {
    "POST".to_string()
}

impl ChannelConfig {
    pub fn channel_type(&self) -> &'static str {
        match self {
            ChannelConfig::Telegram { .. } => "telegram",
            ChannelConfig::Webhook { .. } => "webhook",
        }
    }
}
