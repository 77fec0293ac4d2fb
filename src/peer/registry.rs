//! Connection registry: the set of peers that resolved at startup
//!
//! Built once from the configured addresses, then shared read-only. A peer
//! that fails to resolve is logged and left out; it never blocks the others.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::future::join_all;
use reqwest::Client;
use tracing::{info, warn};

use crate::protocol::PeerCard;

use super::{PeerConnection, PeerDirectory};

/// Summary used when no peer registered
pub const NO_PEERS_SUMMARY: &str = "No peers available";

/// Read-only mapping from peer name to its connection (and card)
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: HashMap<String, PeerConnection>,
    /// Registration order, used for a stable summary
    order: Vec<String>,
    summary: String,
}

impl ConnectionRegistry {
    /// Resolve every address concurrently and register those that succeed.
    ///
    /// Results are applied in address order, so when two addresses report the
    /// same name the later one wins.
    pub async fn build_from(
        addresses: &[String],
        directory: &PeerDirectory,
        client: &Client,
        request_timeout: Duration,
    ) -> Self {
        let resolutions = join_all(addresses.iter().map(|address| async move {
            (address, directory.resolve(address).await)
        }))
        .await;

        let mut registry = Self::empty();
        for (address, result) in resolutions {
            match result {
                Ok(card) => {
                    info!(peer = %card.name, address = %address, "Registered peer");
                    registry.insert(PeerConnection::http(
                        card,
                        address.clone(),
                        client.clone(),
                        request_timeout,
                    ));
                }
                Err(e) => {
                    warn!(address = %address, error = %e.format_for_log(), "Skipping peer");
                }
            }
        }
        registry.refresh_summary();

        info!(
            requested = addresses.len(),
            registered = registry.len(),
            "Peer registry built"
        );
        registry
    }

    /// Registry over connections that were set up by hand
    pub fn from_connections(connections: impl IntoIterator<Item = PeerConnection>) -> Self {
        let mut registry = Self::empty();
        for connection in connections {
            registry.insert(connection);
        }
        registry.refresh_summary();
        registry
    }

    fn empty() -> Self {
        Self {
            connections: HashMap::new(),
            order: Vec::new(),
            summary: String::new(),
        }
    }

    /// Card and connection go in together under the card's name
    fn insert(&mut self, connection: PeerConnection) {
        let name = connection.name().to_string();
        if self.connections.insert(name.clone(), connection).is_some() {
            warn!(peer = %name, "Duplicate peer name, replacing earlier registration");
        } else {
            self.order.push(name);
        }
    }

    fn refresh_summary(&mut self) {
        let lines: Vec<String> = self.cards().map(PeerCard::summary_line).collect();
        self.summary = if lines.is_empty() {
            NO_PEERS_SUMMARY.to_string()
        } else {
            lines.join("\n")
        };
        info!(peers = %self.summary, "Peer summary");
    }

    pub fn get(&self, name: &str) -> Option<&PeerConnection> {
        self.connections.get(name)
    }

    pub fn card(&self, name: &str) -> Option<&PeerCard> {
        self.connections.get(name).map(PeerConnection::card)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Peer names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Cards in registration order
    pub fn cards(&self) -> impl Iterator<Item = &PeerCard> {
        self.order
            .iter()
            .filter_map(|name| self.connections.get(name))
            .map(PeerConnection::card)
    }

    /// One `{"name","description"}` line per peer, or [`NO_PEERS_SUMMARY`]
    pub fn summary(&self) -> &str {
        &self.summary
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CARD_PATH: &str = "/.well-known/agent.json";

    async fn peer_server(name: &str, description: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CARD_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": name,
                "description": description,
                "url": server.uri(),
            })))
            .mount(&server)
            .await;
        server
    }

    async fn build(addresses: Vec<String>) -> ConnectionRegistry {
        let directory = PeerDirectory::new(CARD_PATH, Duration::from_secs(5)).unwrap();
        ConnectionRegistry::build_from(&addresses, &directory, &Client::new(), Duration::from_secs(5))
            .await
    }

    #[tokio::test]
    async fn test_partial_failure_registers_the_rest() {
        let a = peer_server("A_Agent", "Alice").await;
        let c = peer_server("C_Agent", "Carol").await;

        let registry = build(vec![a.uri(), "http://127.0.0.1:1".to_string(), c.uri()]).await;

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("A_Agent"));
        assert!(registry.contains("C_Agent"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["A_Agent", "C_Agent"]);

        let summary = registry.summary();
        assert!(summary.contains("A_Agent"));
        assert!(summary.contains("Carol"));
        assert_eq!(summary.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_card_and_connection_are_registered_together() {
        let a = peer_server("A_Agent", "Alice").await;
        let registry = build(vec![a.uri()]).await;

        let connection = registry.get("A_Agent").unwrap();
        assert_eq!(connection.address(), a.uri());
        assert_eq!(registry.card("A_Agent").unwrap().description, "Alice");
    }

    #[tokio::test]
    async fn test_empty_address_list() {
        let registry = build(vec![]).await;
        assert!(registry.is_empty());
        assert_eq!(registry.summary(), NO_PEERS_SUMMARY);
    }

    #[tokio::test]
    async fn test_all_failing() {
        let broken = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&broken)
            .await;

        let registry = build(vec![broken.uri(), "http://127.0.0.1:1".to_string()]).await;
        assert!(registry.is_empty());
        assert_eq!(registry.summary(), NO_PEERS_SUMMARY);
    }

    #[tokio::test]
    async fn test_duplicate_names_keep_later_address() {
        let first = peer_server("Same_Agent", "first").await;
        let second = peer_server("Same_Agent", "second").await;

        let registry = build(vec![first.uri(), second.uri()]).await;
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.card("Same_Agent").unwrap().description, "second");
        assert_eq!(registry.get("Same_Agent").unwrap().address(), second.uri());
        assert_eq!(registry.summary().lines().count(), 1);
    }

    #[test]
    fn test_summary_lines_are_json() {
        let registry = ConnectionRegistry::from_connections(vec![PeerConnection::http(
            PeerCard::new("Bob_Agent", "Bob's calendar", "http://bob"),
            "http://bob",
            Client::new(),
            Duration::from_secs(1),
        )]);

        let line: serde_json::Value = serde_json::from_str(registry.summary()).unwrap();
        assert_eq!(line, json!({"name": "Bob_Agent", "description": "Bob's calendar"}));
    }
}
