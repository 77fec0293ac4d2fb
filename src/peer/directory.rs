//! Capability card resolution

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::PeerCard;

/// Fetches capability cards from peer base addresses
#[derive(Debug, Clone)]
pub struct PeerDirectory {
    client: Client,
    card_path: String,
    timeout: Duration,
}

impl PeerDirectory {
    /// Create a directory whose fetches are bounded by `timeout`
    pub fn new(card_path: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            card_path: card_path.into(),
            timeout,
        })
    }

    /// Full URL of the card for `address`
    pub fn card_url(&self, address: &str) -> String {
        format!("{}{}", address.trim_end_matches('/'), self.card_path)
    }

    /// Fetch and decode the card served by `address`
    pub async fn resolve(&self, address: &str) -> Result<PeerCard> {
        let url = self.card_url(address);
        debug!(address, url = %url, "Resolving peer card");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::resolution(address, format!("timed out after {:?}", self.timeout))
            } else if e.is_connect() {
                Error::resolution(address, format!("connection failed: {}", e))
            } else {
                Error::resolution(address, e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::resolution(address, format!("card endpoint returned {}", status)));
        }

        let card: PeerCard = response
            .json()
            .await
            .map_err(|e| Error::resolution(address, format!("invalid card: {}", e)))?;

        if card.name.trim().is_empty() {
            return Err(Error::resolution(address, "card has an empty name"));
        }

        Ok(card)
    }
}
