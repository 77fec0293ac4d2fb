//! JSON-RPC envelopes for `message/send` and classification of the reply.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::messages::{Message, Task};

pub const JSONRPC_VERSION: &str = "2.0";
pub const SEND_MESSAGE_METHOD: &str = "message/send";

// ─────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSendParams {
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Outbound `message/send` request. Built fresh for every dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: MessageSendParams,
}

impl SendMessageRequest {
    /// Wrap a message; the request id is the message id
    pub fn new(message: Message) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: message.message_id.clone(),
            method: SEND_MESSAGE_METHOD.to_string(),
            params: MessageSendParams {
                message,
                metadata: None,
            },
        }
    }

    pub fn message(&self) -> &Message {
        &self.params.message
    }
}

// ─────────────────────────────────────────────────────────────────
// Response
// ─────────────────────────────────────────────────────────────────

/// Result payload of a successful send, discriminated by `kind`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SendResult {
    Task(Task),
    Message(Message),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuccessResponse {
    #[serde(default)]
    pub id: Option<Value>,
    pub result: SendResult,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub id: Option<Value>,
    pub error: JsonRpcError,
}

/// Decoded response envelope
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SendMessageResponse {
    Success(SuccessResponse),
    Error(ErrorResponse),
}

// ─────────────────────────────────────────────────────────────────
// Reply classification
// ─────────────────────────────────────────────────────────────────

/// Why a reply carries no usable payload
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The peer answered with a JSON-RPC error envelope
    ErrorEnvelope { code: i64, message: String },
    /// Success envelope, but the result was not a task
    NonTaskResult,
    /// The body could not be decoded as any known envelope
    Malformed(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ErrorEnvelope { code, message } => {
                write!(f, "error envelope {}: {}", code, message)
            }
            FailureReason::NonTaskResult => write!(f, "success envelope without a task result"),
            FailureReason::Malformed(detail) => write!(f, "malformed payload: {}", detail),
        }
    }
}

/// Inbound result of a send: only `Task` carries fragments
#[derive(Debug, Clone, PartialEq)]
pub enum PeerReply {
    Task(Task),
    Failure(FailureReason),
}

impl PeerReply {
    /// Classify a raw response body
    pub fn from_body(body: Value) -> Self {
        match serde_json::from_value::<SendMessageResponse>(body) {
            Ok(response) => response.into(),
            Err(e) => PeerReply::Failure(FailureReason::Malformed(e.to_string())),
        }
    }
}

impl From<SendMessageResponse> for PeerReply {
    fn from(response: SendMessageResponse) -> Self {
        match response {
            SendMessageResponse::Success(SuccessResponse {
                result: SendResult::Task(task),
                ..
            }) => PeerReply::Task(task),
            SendMessageResponse::Success(SuccessResponse {
                result: SendResult::Message(_),
                ..
            }) => PeerReply::Failure(FailureReason::NonTaskResult),
            SendMessageResponse::Error(ErrorResponse { error, .. }) => {
                PeerReply::Failure(FailureReason::ErrorEnvelope {
                    code: error.code,
                    message: error.message,
                })
            }
        }
    }
}
