//! Direct check: fetch the booking schedule page and read the train card.
use async_trait::async_trait;
use chrono::Local;
use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;
use regex::Regex;
use reqwest::{Client, StatusCode, header};
use std::time::Duration;
use tracing::{debug, warn};

use super::{AvailabilityClient, AvailabilityError, CheckOutcome, JourneyInfo};

const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
];

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

static CARD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<div class="data-block list-kereta".*?</form>\s*</div>"#).unwrap()
});
static DEPARTURE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<div class="times time-start">(\d{2}:\d{2})</div>\s*<div class="station date-start">(.*?)</div>"#)
        .unwrap()
});
static ARRIVAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<div class="times time-end">(\d{2}:\d{2})</div>\s*<div class="station date-end">(.*?)</div>"#)
        .unwrap()
});
static DEPARTURE_STATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<div class="[^"]*station station-start[^"]*">([^<"]+)</div>"#).unwrap()
});
static ARRIVAL_STATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<div class="[^"]*station station-end[^"]*">([^<"]+)</div>"#).unwrap()
});
static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<div class="price">(Rp [\d.,]+-)</div>"#).unwrap());
static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<div class="[^"]*long-time[^"]*">([^<]+)</div>"#).unwrap());
static CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<div class="[^"]*kelas[^"]*">([^<]+)</div>"#).unwrap());
static SEATS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<small class="form-text sisa-kursi">([^<]+)</small>"#).unwrap());

/// Fetches the schedule page itself and looks for one named train.
pub struct ScrapingClient {
    client: Client,
    train_name: String,
}

impl ScrapingClient {
    pub fn new(train_name: &str, timeout: Duration) -> Result<Self, AvailabilityError> {
        if train_name.trim().is_empty() {
            return Err(AvailabilityError::InvalidConfiguration(
                "train name must not be empty".to_string(),
            ));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            train_name: train_name.trim().to_uppercase(),
        })
    }
}

#[async_trait]
impl AvailabilityClient for ScrapingClient {
    async fn check_availability(&self, target: &str) -> Result<CheckOutcome, AvailabilityError> {
        let mut logs = vec![format!("[{}] Checking status...", Local::now().format("%H:%M:%S"))];
        let user_agent = USER_AGENTS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let response = self
            .client
            .get(target)
            .header(header::USER_AGENT, user_agent)
            .header(header::ACCEPT, ACCEPT_HTML)
            .header(header::CONNECTION, "keep-alive")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = %status, "Schedule page returned a non-200 status.");
            logs.push(format!("Error: HTTP {}", status.as_u16()));
            return Ok(CheckOutcome::failed(logs));
        }

        let page = response.text().await?;
        debug!(bytes = page.len(), "Fetched schedule page.");
        Ok(read_schedule_page(&page, &self.train_name, logs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SeatStatus {
    Available(String),
    SoldOut(String),
}

fn classify_seats(raw: &str) -> SeatStatus {
    let lower = raw.to_lowercase();
    if lower.contains("tersedia") {
        SeatStatus::Available("AVAILABLE (Many Seats)".to_string())
    } else if lower.contains("sisa") && lower.contains("kursi") {
        SeatStatus::Available(format!("AVAILABLE ({raw})"))
    } else if lower.contains("habis") {
        SeatStatus::SoldOut("Habis / Sold Out".to_string())
    } else {
        SeatStatus::SoldOut("Sold Out".to_string())
    }
}

fn capture(re: &Regex, card: &str) -> Option<String> {
    re.captures(card)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn extract_journey_details(card: &str, train_name: &str) -> JourneyInfo {
    let mut journey = JourneyInfo {
        name: train_name.to_string(),
        ..JourneyInfo::default()
    };

    if let Some(caps) = DEPARTURE_RE.captures(card) {
        journey.departure_time = caps[1].to_string();
        journey.departure_date = caps[2].trim().to_string();
    }
    if let Some(caps) = ARRIVAL_RE.captures(card) {
        journey.arrival_time = caps[1].to_string();
        journey.arrival_date = caps[2].trim().to_string();
    }
    journey.departure_station = capture(&DEPARTURE_STATION_RE, card);
    journey.arrival_station = capture(&ARRIVAL_STATION_RE, card);
    journey.price = capture(&PRICE_RE, card).unwrap_or_default();
    journey.duration = capture(&DURATION_RE, card).unwrap_or_default();
    journey.travel_class = capture(&CLASS_RE, card).unwrap_or_default();
    journey.remaining_seats = capture(&SEATS_RE, card).unwrap_or_default();
    journey
}

/// Reads the first card for `train_name` out of a schedule page.
///
/// `logs` carries lines already produced for this check and is extended in place.
pub fn read_schedule_page(page: &str, train_name: &str, mut logs: Vec<String>) -> CheckOutcome {
    let wanted = train_name.to_uppercase();
    let card = CARD_RE
        .find_iter(page)
        .map(|m| m.as_str())
        .find(|card| card.to_uppercase().contains(&wanted));

    let Some(card) = card else {
        logs.push(format!("Train {wanted} not found in this page."));
        return CheckOutcome {
            success: true,
            is_available: false,
            logs,
            data: None,
        };
    };

    let mut journey = extract_journey_details(card, &wanted);
    let (is_available, status_text) = match classify_seats(&journey.remaining_seats) {
        SeatStatus::Available(text) => (true, text),
        SeatStatus::SoldOut(text) => (false, text),
    };

    let icon = if is_available { "🟢" } else { "🔴" };
    logs.push(format!("{icon} {wanted}: {status_text}"));
    if is_available {
        let price = if journey.price.is_empty() { "N/A" } else { &journey.price };
        logs.push(format!("   Price: {price}"));
        logs.push("   GO BOOK NOW!".to_string());
        journey.status_text = Some(status_text);
    }

    CheckOutcome {
        success: true,
        is_available,
        logs,
        data: Some(journey),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(name: &str, seats: &str) -> String {
        format!(
            r#"<div class="data-block list-kereta" data-kereta="{name}">
  <div class="name">{name}</div>
  <div class="col-one kelas">Ekonomi (C)</div>
  <div class="station station-start">SOLO JEBRES</div>
  <div class="station station-end">PASARSENEN</div>
  <div class="times time-start">06:20</div>
  <div class="station date-start">2025-12-20</div>
  <div class="long-time">9j 35m</div>
  <div class="times time-end">15:55</div>
  <div class="station date-end">2025-12-20</div>
  <div class="price">Rp 74.000,-</div>
  <small class="form-text sisa-kursi">{seats}</small>
  <form action="/booking"></form>
</div>"#
        )
    }

    fn page(cards: &[String]) -> String {
        format!("<html><body>{}</body></html>", cards.join("\n"))
    }

    #[test]
    fn test_available_card_is_parsed() {
        let html = page(&[card("JAYAKARTA", "Tersedia"), card("BENGAWAN", "Tersedia")]);
        let outcome = read_schedule_page(&html, "bengawan", vec![]);

        assert!(outcome.success);
        assert!(outcome.is_available);
        let data = outcome.data.unwrap();
        assert_eq!(data.name, "BENGAWAN");
        assert_eq!(data.departure_time, "06:20");
        assert_eq!(data.departure_date, "2025-12-20");
        assert_eq!(data.arrival_time, "15:55");
        assert_eq!(data.departure_station.as_deref(), Some("SOLO JEBRES"));
        assert_eq!(data.arrival_station.as_deref(), Some("PASARSENEN"));
        assert_eq!(data.price, "Rp 74.000,-");
        assert_eq!(data.duration, "9j 35m");
        assert_eq!(data.travel_class, "Ekonomi (C)");
        assert_eq!(data.status_text.as_deref(), Some("AVAILABLE (Many Seats)"));
        assert_eq!(
            outcome.logs,
            vec![
                "🟢 BENGAWAN: AVAILABLE (Many Seats)".to_string(),
                "   Price: Rp 74.000,-".to_string(),
                "   GO BOOK NOW!".to_string(),
            ]
        );
    }

    #[test]
    fn test_few_seats_left_counts_as_available() {
        let html = page(&[card("BENGAWAN", "Sisa 2 Kursi")]);
        let outcome = read_schedule_page(&html, "BENGAWAN", vec![]);
        assert!(outcome.is_available);
        assert_eq!(outcome.logs[0], "🟢 BENGAWAN: AVAILABLE (Sisa 2 Kursi)");
        assert_eq!(outcome.data.unwrap().remaining_seats, "Sisa 2 Kursi");
    }

    #[test]
    fn test_sold_out_keeps_journey_data() {
        let html = page(&[card("BENGAWAN", "Habis")]);
        let outcome = read_schedule_page(&html, "BENGAWAN", vec!["first".to_string()]);
        assert!(outcome.success);
        assert!(!outcome.is_available);
        assert_eq!(outcome.logs, vec!["first".to_string(), "🔴 BENGAWAN: Habis / Sold Out".to_string()]);
        let data = outcome.data.unwrap();
        assert_eq!(data.price, "Rp 74.000,-");
        assert_eq!(data.status_text, None);
    }

    #[test]
    fn test_missing_train() {
        let html = page(&[card("JAYAKARTA", "Tersedia")]);
        let outcome = read_schedule_page(&html, "BENGAWAN", vec![]);
        assert!(outcome.success);
        assert!(!outcome.is_available);
        assert!(outcome.data.is_none());
        assert_eq!(outcome.logs, vec!["Train BENGAWAN not found in this page.".to_string()]);
    }

    #[test]
    fn test_classify_seats() {
        assert_eq!(classify_seats(""), SeatStatus::SoldOut("Sold Out".to_string()));
        assert_eq!(
            classify_seats("HABIS"),
            SeatStatus::SoldOut("Habis / Sold Out".to_string())
        );
        assert!(matches!(classify_seats("tersedia"), SeatStatus::Available(_)));
    }

    #[test]
    fn test_empty_train_name_rejected() {
        assert!(ScrapingClient::new("  ", Duration::from_secs(10)).is_err());
    }
}
