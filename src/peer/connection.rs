//! Per-peer client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{PeerCard, PeerReply, SendMessageRequest};

// ─────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────

/// Moves one request to a peer and returns the raw reply body.
///
/// Implementations return `Error::Transport`/`Error::Timeout` when nothing
/// usable came back over the wire, and `Error::MalformedResponse` when a
/// body arrived that is not JSON.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn send(&self, request: &SendMessageRequest) -> Result<Value>;
}

/// JSON-RPC over HTTP POST
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(client: Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

fn timeout_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn send(&self, request: &SendMessageRequest) -> Result<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout {
                        peer: self.endpoint.clone(),
                        timeout_ms: timeout_ms(self.timeout),
                    }
                } else {
                    Error::transport(&self.endpoint, e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transport(
                &self.endpoint,
                format!("HTTP {}: {}", status, body),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::transport(&self.endpoint, e.to_string()))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| Error::malformed(&self.endpoint, format!("body is not JSON: {}", e)))
    }
}

// ─────────────────────────────────────────────────────────────────
// Peer Connection
// ─────────────────────────────────────────────────────────────────

/// Client bound to one resolved peer
pub struct PeerConnection {
    card: PeerCard,
    address: String,
    transport: Arc<dyn PeerTransport>,
}

impl PeerConnection {
    /// HTTP connection posting to the address the card was resolved from
    pub fn http(card: PeerCard, address: impl Into<String>, client: Client, timeout: Duration) -> Self {
        let address = address.into();
        let transport = HttpTransport::new(client, address.clone(), timeout);
        Self::with_transport(card, address, Arc::new(transport))
    }

    pub fn with_transport(
        card: PeerCard,
        address: impl Into<String>,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        Self {
            card,
            address: address.into(),
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.card.name
    }

    pub fn card(&self) -> &PeerCard {
        &self.card
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send one request and classify the reply.
    ///
    /// Transport failures come back as `Err`; anything the peer actually
    /// answered comes back as a `PeerReply`.
    pub async fn send_message(&self, request: &SendMessageRequest) -> Result<PeerReply> {
        debug!(
            peer = %self.card.name,
            message_id = %request.id,
            "Sending message to peer"
        );
        let body = self.transport.send(request).await.map_err(|e| match e {
            Error::Transport { message, .. } => Error::transport(&self.card.name, message),
            Error::Timeout { timeout_ms, .. } => Error::Timeout {
                peer: self.card.name.clone(),
                timeout_ms,
            },
            Error::MalformedResponse { message, .. } => Error::malformed(&self.card.name, message),
            other => other,
        })?;
        Ok(PeerReply::from_body(body))
    }
}

impl std::fmt::Debug for PeerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConnection")
            .field("name", &self.card.name)
            .field("address", &self.address)
            .finish()
    }
}
