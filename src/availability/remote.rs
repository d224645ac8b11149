use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{AvailabilityClient, AvailabilityError, CheckOutcome};
use crate::version::USER_AGENT_PRODUCT;

/// Delegates the check to a `seat-hunter-server` (or any compatible
/// `/check-availability` endpoint).
pub struct RemoteClient {
    client: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct CheckRequest<'a> {
    url: &'a str,
}

impl RemoteClient {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, AvailabilityError> {
        let base = api_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(AvailabilityError::InvalidConfiguration(
                "api_url must not be empty".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT_PRODUCT)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{base}/check-availability"),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AvailabilityClient for RemoteClient {
    async fn check_availability(&self, target: &str) -> Result<CheckOutcome, AvailabilityError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&CheckRequest { url: target })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(AvailabilityError::InvalidResponse(format!(
                "check endpoint returned {status}: {error_body}"
            )));
        }

        let outcome: CheckOutcome = response.json().await?;
        debug!(
            success = outcome.success,
            is_available = outcome.is_available,
            lines = outcome.logs.len(),
            "Remote check finished."
        );
        Ok(outcome)
    }
}
