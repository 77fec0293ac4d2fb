//! Capability card served by each friend agent.

use serde::{Deserialize, Serialize};

/// Metadata describing a peer, fetched once during discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerCard {
    /// Unique peer name, used as the registry key
    pub name: String,

    /// What the peer does, shown to the decision-making model
    #[serde(default)]
    pub description: String,

    /// Endpoint advertised by the peer
    #[serde(default)]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<PeerCapabilities>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<PeerSkill>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_input_modes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_output_modes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerCapabilities {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub push_notifications: bool,
}

/// A single advertised skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerSkill {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl PeerCard {
    /// Minimal card, mostly useful for wiring peers by hand
    pub fn new(name: impl Into<String>, description: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            url: url.into(),
            version: None,
            capabilities: None,
            skills: Vec::new(),
            default_input_modes: Vec::new(),
            default_output_modes: Vec::new(),
        }
    }

    /// One-line JSON summary (`{"name":..,"description":..}`) for prompt construction
    pub fn summary_line(&self) -> String {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
        })
        .to_string()
    }
}
