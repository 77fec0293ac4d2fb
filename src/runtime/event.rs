//! Conversation content and the events a runtime emits while processing a turn

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Who produced a piece of content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentRole {
    User,
    Model,
    Tool,
}

/// One part of a conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPart {
    Text(String),
    FunctionCall {
        id: String,
        name: String,
        args: Value,
    },
    FunctionResponse {
        id: String,
        name: String,
        response: Value,
    },
}

impl ContentPart {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: ContentRole,
    pub parts: Vec<ContentPart>,
}

impl Content {
    pub fn new(role: ContentRole, parts: Vec<ContentPart>) -> Self {
        Self { role, parts }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(ContentRole::User, vec![ContentPart::Text(text.into())])
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self::new(ContentRole::Model, vec![ContentPart::Text(text.into())])
    }

    /// Non-empty text parts joined by newlines
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(ContentPart::as_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One step reported by a runtime during a turn
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeEvent {
    pub id: String,
    pub author: String,
    pub content: Option<Content>,
    /// Set on the single event that answers the turn
    pub is_final: bool,
}

impl RuntimeEvent {
    pub fn partial(author: impl Into<String>, content: Content) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author: author.into(),
            content: Some(content),
            is_final: false,
        }
    }

    pub fn final_response(author: impl Into<String>, content: Option<Content>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author: author.into(),
            content,
            is_final: true,
        }
    }

    /// Text carried by a final event; empty when it has none
    pub fn final_text(&self) -> String {
        self.content
            .as_ref()
            .map(Content::joined_text)
            .unwrap_or_default()
    }
}
