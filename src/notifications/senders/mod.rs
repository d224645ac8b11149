use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use super::models::ChannelConfig;

pub mod telegram;
pub mod webhook;

/// Why an alert did not reach a channel. Never retried; the caller only logs it.
#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Channel rejected the alert: {0}")]
    SendFailed(String),
    #[error("Channel misconfigured: {0}")]
    InvalidConfiguration(String),
    #[error("Network error while delivering alert: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Alert body template failed: {0}")]
    TemplatingError(String),
}

/// Pushes one rendered alert to a channel of a specific type.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// * `config` - the channel this send is for; senders reject other variants.
    /// * `message` - plain-text alert body.
    /// * `context` - journey fields by name, for senders that render templates.
    async fn send(
        &self,
        config: &ChannelConfig,
        message: &str,
        context: &HashMap<String, String>,
    ) -> Result<(), SenderError>;
}
