//! Availability checks: one remote lookup of a booking page per call.
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub mod remote;
pub mod scraper;

pub use remote::RemoteClient;
pub use scraper::ScrapingClient;

#[derive(Error, Debug)]
pub enum AvailabilityError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Descriptive snapshot of a booking as read from the schedule page.
///
/// Every field is passed through verbatim; nothing here is parsed into dates
/// or amounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyInfo {
    #[serde(default, deserialize_with = "string_or_null")]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub price: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub remaining_seats: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub departure_time: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub arrival_time: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub departure_date: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub arrival_date: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub duration: String,
    #[serde(rename = "class", default, deserialize_with = "string_or_null")]
    pub travel_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_station: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_station: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
}

impl JourneyInfo {
    /// Seat line used in alerts; falls back to "Available" when the page gave no count.
    pub fn seats_label(&self) -> &str {
        if self.remaining_seats.is_empty() {
            "Available"
        } else {
            &self.remaining_seats
        }
    }
}

// The check endpoint emits `null` for anything it could not find on the page.
fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Result of a single check, shaped like the `/check-availability` response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub success: bool,
    pub is_available: bool,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub data: Option<JourneyInfo>,
}

impl CheckOutcome {
    pub fn failed(logs: Vec<String>) -> Self {
        Self {
            success: false,
            is_available: false,
            logs,
            data: None,
        }
    }
}

/// Performs one availability lookup for `target`.
///
/// Implementations must not retry internally; the scheduler owns the cadence.
#[async_trait]
pub trait AvailabilityClient: Send + Sync {
    async fn check_availability(&self, target: &str) -> Result<CheckOutcome, AvailabilityError>;
}
