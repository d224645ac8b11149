//! Best-effort alert delivery. Nothing here reports failure back to the scheduler.
use reqwest::Client;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::availability::JourneyInfo;

pub mod models;
pub mod senders;

use models::ChannelConfig;
use senders::{NotificationSender, telegram::TelegramSender, webhook::WebhookSender};

pub const ALERT_TITLE: &str = "SEAT AVAILABLE!";

/// Receives one call per fresh availability run.
///
/// Implementations must return quickly and must not fail outward: anything
/// slow is spawned, anything broken is logged.
pub trait Notifier: Send + Sync {
    fn notify(&self, journey: &JourneyInfo);
}

/// `"<name> - <price>\n<seats> seats left!"`
pub fn alert_message(journey: &JourneyInfo) -> String {
    format!(
        "{} - {}\n{} seats left!",
        journey.name,
        journey.price,
        journey.seats_label()
    )
}

/// Journey fields keyed by their wire names, for template rendering.
pub fn alert_context(journey: &JourneyInfo) -> HashMap<String, String> {
    let mut context = HashMap::from([
        ("title".to_string(), ALERT_TITLE.to_string()),
        ("name".to_string(), journey.name.clone()),
        ("price".to_string(), journey.price.clone()),
        ("remaining_seats".to_string(), journey.seats_label().to_string()),
        ("departure_time".to_string(), journey.departure_time.clone()),
        ("arrival_time".to_string(), journey.arrival_time.clone()),
        ("departure_date".to_string(), journey.departure_date.clone()),
        ("arrival_date".to_string(), journey.arrival_date.clone()),
        ("duration".to_string(), journey.duration.clone()),
        ("class".to_string(), journey.travel_class.clone()),
    ]);
    let optional = [
        ("departure_station", &journey.departure_station),
        ("arrival_station", &journey.arrival_station),
        ("status_text", &journey.status_text),
    ];
    for (key, value) in optional {
        context.insert(key.to_string(), value.clone().unwrap_or_default());
    }
    context
}

/// Terminal alert: a banner in the log plus a burst of bell characters.
pub struct ConsoleNotifier {
    beeps: u32,
    beep_interval: Duration,
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(400))
    }
}

impl ConsoleNotifier {
    pub fn new(beeps: u32, beep_interval: Duration) -> Self {
        Self {
            beeps,
            beep_interval,
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, journey: &JourneyInfo) {
        warn!(alert = %alert_message(journey), "{ALERT_TITLE}");

        let beeps = self.beeps;
        let interval = self.beep_interval;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available; skipping audible alert.");
            return;
        };
        runtime.spawn(async move {
            for _ in 0..beeps {
                let mut stdout = std::io::stdout();
                if stdout.write_all(b"\x07").and_then(|_| stdout.flush()).is_err() {
                    warn!("Terminal bell unavailable.");
                    return;
                }
                tokio::time::sleep(interval).await;
            }
        });
    }
}

/// Fans an alert out to Telegram/webhook channels, one spawned send per channel.
pub struct ChannelNotifier {
    channels: Vec<ChannelConfig>,
    telegram: Arc<TelegramSender>,
    webhook: Arc<WebhookSender>,
}

impl ChannelNotifier {
    pub fn new(channels: Vec<ChannelConfig>) -> Self {
        let client = Client::new();
        Self {
            channels,
            telegram: Arc::new(TelegramSender::new(client.clone())),
            webhook: Arc::new(WebhookSender::new(client)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn sender_for(&self, config: &ChannelConfig) -> Arc<dyn NotificationSender> {
        match config {
            ChannelConfig::Telegram { .. } => self.telegram.clone() as Arc<dyn NotificationSender>,
            ChannelConfig::Webhook { .. } => self.webhook.clone(),
        }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, journey: &JourneyInfo) {
        if self.channels.is_empty() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("No async runtime available; dropping channel notifications.");
            return;
        };
        let message = format!("{ALERT_TITLE}\n{}", alert_message(journey));
        let context = Arc::new(alert_context(journey));

        for config in &self.channels {
            let sender = self.sender_for(config);
            let config = config.clone();
            let message = message.clone();
            let context = Arc::clone(&context);
            runtime.spawn(async move {
                let channel_type = config.channel_type();
                match sender.send(&config, &message, &context).await {
                    Ok(()) => info!(channel = channel_type, "Alert delivered."),
                    Err(e) => error!(channel = channel_type, error = %e, "Failed to deliver alert."),
                }
            });
        }
    }
}

/// Calls every contained notifier in order.
#[derive(Default)]
pub struct NotifierSet {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }
}

impl Notifier for NotifierSet {
    fn notify(&self, journey: &JourneyInfo) {
        for notifier in &self.notifiers {
            notifier.notify(journey);
        }
    }
}
